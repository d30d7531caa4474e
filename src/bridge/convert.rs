use std::time::Duration;

use log::{debug, error};
use nalgebra as na;

use super::transform::RigidTransform;
use crate::engine::Pose;
use crate::transport::TransformLookup;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Axis permutation from the ORB camera convention (x right, y down, z
/// forward) to ROS (x forward, y left, z up).
#[rustfmt::skip]
pub fn orb_to_ros() -> na::Matrix3<f64> {
    na::Matrix3::<f64>::new(
        0.0, 0.0, 1.0,
        -1.0, 0.0, 0.0,
        0.0, -1.0, 0.0,
    )
}

/// Maps SLAM poses into the ROS map frame and chains the calibration
/// transform `parent_frame <- child_frame` onto the result.
pub struct FrameConverter {
    parent_frame: String,
    child_frame: String,
    timeout: Duration,
    last_calibration: Option<RigidTransform>,
}

impl FrameConverter {
    pub fn new(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
            timeout,
            last_calibration: None,
        }
    }

    /// Permute into ROS axes, invert, permute again.
    pub fn to_ros_convention(pose: &Pose) -> RigidTransform {
        let p = orb_to_ros();
        pose.premultiply(&p).inverse().premultiply(&p)
    }

    /// Latest calibration transform, or the last one that resolved (identity
    /// if none ever did). Lookup failures are logged and swallowed.
    pub fn calibration<L: TransformLookup + ?Sized>(&mut self, lookup: &L) -> RigidTransform {
        match lookup.lookup_transform(&self.parent_frame, &self.child_frame, self.timeout) {
            Ok(calibration) => {
                self.last_calibration = Some(calibration);
                calibration
            }
            Err(e) => {
                error!("{}", e);
                let fallback = self.last_calibration.unwrap_or_else(RigidTransform::identity);
                debug!(
                    "using {} calibration {} <- {}",
                    if self.last_calibration.is_some() { "stale" } else { "identity" },
                    self.parent_frame,
                    self.child_frame
                );
                fallback
            }
        }
    }

    pub fn convert<L>(&mut self, pose: &Pose, lookup: &L) -> RigidTransform
    where
        L: TransformLookup + ?Sized,
    {
        let in_ros = Self::to_ros_convention(pose);
        let calibration = self.calibration(lookup);
        in_ros.compose(&calibration)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use approx::assert_relative_eq;
    use nalgebra as na;

    use super::*;
    use crate::bridge::error::{Error, Result};
    use crate::bridge::test_log;

    fn unavailable(parent: &str, child: &str, _timeout: Duration) -> Result<RigidTransform> {
        Err(Error::TransformUnavailable {
            parent: parent.into(),
            child: child.into(),
            reason: "timed out".into(),
        })
    }

    fn identity_lookup(_: &str, _: &str, _: Duration) -> Result<RigidTransform> {
        Ok(RigidTransform::identity())
    }

    fn converter() -> FrameConverter {
        FrameConverter::new("head_camera_link", "odom", DEFAULT_LOOKUP_TIMEOUT)
    }

    #[test]
    fn permutation_is_a_rotation() {
        let p = orb_to_ros();
        assert_relative_eq!(p * p.transpose(), na::Matrix3::identity());
        assert_relative_eq!(p.determinant(), 1.0);
        assert_eq!(p * na::Vector3::new(1.0, 2.0, 3.0), na::Vector3::new(3.0, -1.0, -2.0));
    }

    #[test]
    fn identity_pose_is_fixed_point() {
        let out = converter().convert(&RigidTransform::identity(), &identity_lookup);
        assert_relative_eq!(out.rotation, na::Matrix3::identity());
        assert_relative_eq!(out.translation, na::Vector3::zeros());
    }

    #[test]
    fn pure_translation_reference() {
        // R' = P, t' = (3,-1,-2); inverse gives t'' = (-1,-2,-3); P again gives (-3,1,2).
        let pose = RigidTransform::from_translation(1.0, 2.0, 3.0);
        let out = converter().convert(&pose, &identity_lookup);
        assert_relative_eq!(out.rotation, na::Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(out.translation, na::Vector3::new(-3.0, 1.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn matches_conjugated_inverse() {
        let iso = na::Isometry3::<f64>::new(
            na::Vector3::new(0.4, -0.2, 1.5),
            na::Vector3::new(0.2, -0.5, 0.1),
        );
        let pose = RigidTransform::from_isometry(&iso);
        let p = orb_to_ros();
        let expected = p * iso.inverse().to_homogeneous().fixed_view::<3, 3>(0, 0) * p.transpose();
        let expected_t = p * iso.inverse().translation.vector;

        let out = FrameConverter::to_ros_convention(&pose);
        assert_relative_eq!(out.rotation, expected, epsilon = 1e-12);
        assert_relative_eq!(out.translation, expected_t, epsilon = 1e-12);
        // input untouched
        assert_eq!(pose, RigidTransform::from_isometry(&iso));
    }

    #[test]
    fn composes_calibration_on_the_right() {
        let calibration = RigidTransform::from_translation(0.0, 0.0, 0.5);
        let lookup = |parent: &str, child: &str, timeout: Duration| -> Result<RigidTransform> {
            assert_eq!(parent, "head_camera_link");
            assert_eq!(child, "odom");
            assert_eq!(timeout, DEFAULT_LOOKUP_TIMEOUT);
            Ok(calibration)
        };
        let pose = RigidTransform::from_translation(1.0, 2.0, 3.0);
        let out = converter().convert(&pose, &lookup);
        assert_relative_eq!(out.translation, na::Vector3::new(-3.0, 1.0, 2.5), epsilon = 1e-12);
    }

    #[test]
    fn unavailable_falls_back_to_identity_then_stale_value() {
        let pose = RigidTransform::from_translation(1.0, 2.0, 3.0);
        let mut converter = converter();

        let (first, records) = test_log::capture(|| converter.convert(&pose, &unavailable));
        assert_relative_eq!(first.translation, na::Vector3::new(-3.0, 1.0, 2.0), epsilon = 1e-12);
        assert_eq!(records.iter().filter(|r| r.level == log::Level::Error).count(), 1);

        let calibration = RigidTransform::from_translation(1.0, 0.0, 0.0);
        let calls = Cell::new(0);
        let flaky = |parent: &str, child: &str, timeout: Duration| -> Result<RigidTransform> {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Ok(calibration)
            } else {
                unavailable(parent, child, timeout)
            }
        };
        let fresh = converter.convert(&pose, &flaky);
        let stale = converter.convert(&pose, &flaky);
        assert_eq!(calls.get(), 2);
        assert_relative_eq!(fresh.translation, na::Vector3::new(-2.0, 1.0, 2.0), epsilon = 1e-12);
        assert_eq!(fresh, stale);

        let still_stale = converter.convert(&pose, &unavailable);
        assert_eq!(still_stale, fresh);
    }
}
