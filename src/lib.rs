pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod math;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod skeleton;
