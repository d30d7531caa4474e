use nalgebra as na;

/// Rotation + translation pair.
///
/// The rotation is kept as a plain matrix so conversions can apply the axis
/// permutation and inversion exactly as written, without re-orthonormalising
/// in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn new(rotation: na::Matrix3<f64>, translation: na::Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(na::Matrix3::identity(), na::Vector3::zeros())
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(na::Matrix3::identity(), na::Vector3::new(x, y, z))
    }

    /// Twelve values of a row-major 3x4 `[R | t]` matrix.
    pub fn from_row_slice_3x4(values: &[f64]) -> Option<Self> {
        if values.len() != 12 {
            return None;
        }
        let mat = na::Matrix3x4::<f64>::from_row_slice(values);
        Some(Self::new(
            mat.fixed_view::<3, 3>(0, 0).into_owned(),
            mat.column(3).into_owned(),
        ))
    }

    pub fn from_isometry(iso: &na::Isometry3<f64>) -> Self {
        Self::new(
            iso.rotation.to_rotation_matrix().into_inner(),
            iso.translation.vector,
        )
    }

    pub fn from_parts(translation: na::Vector3<f64>, rotation: na::UnitQuaternion<f64>) -> Self {
        Self::new(rotation.to_rotation_matrix().into_inner(), translation)
    }

    /// Nearest proper rotation as a quaternion, for wire formats that need one.
    pub fn quaternion(&self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_rotation_matrix(&na::Rotation3::from_matrix(&self.rotation))
    }

    /// `m * self`, applied to both rotation and translation.
    pub fn premultiply(&self, m: &na::Matrix3<f64>) -> Self {
        Self::new(m * self.rotation, m * self.translation)
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self::new(rotation, -(rotation * self.translation))
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> Self {
        Self::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    pub fn transform_point(&self, point: &na::Vector3<f64>) -> na::Vector3<f64> {
        self.rotation * point + self.translation
    }
}
