use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, Quaternion, SquareMatrix, Vector3, Vector4};

/// Per-component tolerance used when deciding whether a shape moved a control point.
pub const SHAPE_EPSILON: f64 = 0.000001;

/// Homogeneous control point / position, as stored by the source scene.
pub type Point4 = Vector4<f64>;

/// Component-wise comparison of all four homogeneous components.
pub fn nearly_equal(a: Point4, b: Point4, epsilon: f64) -> bool {
    (a.x - b.x).abs() <= epsilon
        && (a.y - b.y).abs() <= epsilon
        && (a.z - b.z).abs() <= epsilon
        && (a.w - b.w).abs() <= epsilon
}

/// Builds a transform from 16 values laid out row by row (`m[row * 4 + col]`),
/// the layout used by skeleton files.
pub fn matrix_from_row_major(m: &[f64; 16]) -> Matrix4<f64> {
    // cgmath takes columns
    Matrix4::new(
        m[0], m[4], m[8], m[12],
        m[1], m[5], m[9], m[13],
        m[2], m[6], m[10], m[14],
        m[3], m[7], m[11], m[15],
    )
}

pub fn matrix_to_column_major_f32(m: &Matrix4<f64>) -> [f32; 16] {
    [
        m.x.x as f32, m.x.y as f32, m.x.z as f32, m.x.w as f32,
        m.y.x as f32, m.y.y as f32, m.y.z as f32, m.y.w as f32,
        m.z.x as f32, m.z.y as f32, m.z.z as f32, m.z.w as f32,
        m.w.x as f32, m.w.y as f32, m.w.z as f32, m.w.w as f32,
    ]
}

pub fn matrix_from_column_major_f32(m: [[f32; 4]; 4]) -> Matrix4<f64> {
    let col = |c: [f32; 4]| Vector4::new(c[0] as f64, c[1] as f64, c[2] as f64, c[3] as f64);
    Matrix4::from_cols(col(m[0]), col(m[1]), col(m[2]), col(m[3]))
}

pub fn transform_point(transform: &Matrix4<f64>, point: Point4) -> Point4 {
    transform * point
}

/// Inverse-transpose of the upper 3x3, for carrying normals into world space.
/// A singular transform falls back to its own upper 3x3.
pub fn normal_matrix(transform: &Matrix4<f64>) -> Matrix3<f64> {
    let upper = Matrix3::from_cols(
        transform.x.truncate(),
        transform.y.truncate(),
        transform.z.truncate(),
    );
    match upper.invert() {
        Some(inverse) => inverse.transpose(),
        None => upper,
    }
}

pub fn transform_normal(normal_matrix: &Matrix3<f64>, normal: Vector3<f64>) -> Vector3<f64> {
    let transformed = normal_matrix * normal;
    if transformed.magnitude2() > 0.0 {
        transformed.normalize()
    } else {
        transformed
    }
}

/// Decomposed local pose of a bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseComponents {
    pub translation: Vector3<f64>,
    pub rotation: Quaternion<f64>,
    pub scale: Vector3<f64>,
}

impl PoseComponents {
    pub fn translation_f32(&self) -> [f32; 3] {
        let t = self.translation;
        [t.x as f32, t.y as f32, t.z as f32]
    }

    /// glTF order: x, y, z, w
    pub fn rotation_f32(&self) -> [f32; 4] {
        let q = self.rotation;
        [q.v.x as f32, q.v.y as f32, q.v.z as f32, q.s as f32]
    }

    pub fn scale_f32(&self) -> [f32; 3] {
        let s = self.scale;
        [s.x as f32, s.y as f32, s.z as f32]
    }
}

/// Splits an affine transform into translation, rotation and per-axis scale.
/// Scale is the length of each basis column; the rotation comes from the
/// scale-normalized basis.
pub fn decompose(m: &Matrix4<f64>) -> PoseComponents {
    let translation = m.w.truncate();

    let mut col0 = m.x.truncate();
    let mut col1 = m.y.truncate();
    let mut col2 = m.z.truncate();

    let scale = Vector3::new(col0.magnitude(), col1.magnitude(), col2.magnitude());

    if scale.x != 0.0 {
        col0 /= scale.x;
    }
    if scale.y != 0.0 {
        col1 /= scale.y;
    }
    if scale.z != 0.0 {
        col2 /= scale.z;
    }

    let rotation = Quaternion::from(Matrix3::from_cols(col0, col1, col2)).normalize();

    PoseComponents {
        translation,
        rotation,
        scale,
    }
}
