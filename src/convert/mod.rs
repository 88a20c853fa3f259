pub mod context;
pub mod export;
pub mod import;
pub mod options;

pub use context::ConversionContext;
pub use export::export_model;
pub use import::{build_submesh, import_scene, BuiltSubmesh};
pub use options::ConvertOptions;
