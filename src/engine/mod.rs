//! SLAM engine side of the bridge.
//!
//! Tracking, mapping and loop closing happen inside the engine; the bridge
//! only reads its current pose, map and debug rendering, and forwards a few
//! mode switches.

pub mod camera;
pub mod render;
pub mod replay;
pub mod message;
pub mod remote;

#[cfg(test)]
pub(crate) mod mock;

use image::RgbImage;
use nalgebra as na;

use crate::bridge::transform::RigidTransform;

/// World-to-camera transform in the engine's camera convention.
pub type Pose = RigidTransform;

pub type LandmarkId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    pub id: LandmarkId,
    pub position: na::Vector3<f64>,
    pub observations: u32,
}

impl Landmark {
    pub fn new(id: LandmarkId, position: na::Vector3<f64>, observations: u32) -> Self {
        Self {
            id,
            position,
            observations,
        }
    }
}

/// Queries and mode switches the bridge needs from a SLAM engine.
///
/// Methods take `&self` because the update tick and the reconfiguration
/// callback reach the engine from different threads.
pub trait SlamEngine: Send + Sync {
    /// `None` while tracking is lost or not yet initialised.
    fn current_pose(&self) -> Option<Pose>;

    fn landmarks(&self) -> Vec<Landmark>;

    fn rendered_frame(&self) -> RgbImage;

    fn set_localization_only(&self, enabled: bool);

    fn reset(&self);

    fn set_min_keyframes(&self, count: u32);
}
