//! Middleware side of the bridge.
//!
//! The node never talks to ROS directly: it resolves calibration transforms
//! through [`TransformLookup`] and hands finished messages to a [`Publisher`].

#[cfg(feature = "ros")]
pub mod ros;

use std::time::Duration;

use image::RgbImage;

use crate::bridge::error::Result;
use crate::bridge::projector::PointCloud;
use crate::bridge::transform::RigidTransform;

pub const TF_TOPIC: &str = "/tf";
pub const DEBUG_IMAGE_TOPIC: &str = "~debug_image";
pub const MAP_POINTS_TOPIC: &str = "~map_points";

/// Resolves the transform that maps `child` coordinates into `parent`,
/// waiting at most `timeout` for it to become available.
pub trait TransformLookup {
    fn lookup_transform(&self, parent: &str, child: &str, timeout: Duration)
        -> Result<RigidTransform>;
}

impl<F> TransformLookup for F
where
    F: Fn(&str, &str, Duration) -> Result<RigidTransform>,
{
    fn lookup_transform(
        &self,
        parent: &str,
        child: &str,
        timeout: Duration,
    ) -> Result<RigidTransform> {
        self(parent, child, timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampedTransform {
    pub stamp: Duration,
    pub parent_frame: String,
    pub child_frame: String,
    pub transform: RigidTransform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampedImage {
    pub stamp: Duration,
    pub frame_id: String,
    pub image: RgbImage,
}

impl StampedImage {
    pub const ENCODING: &'static str = "bgr8";

    /// Pixel bytes in `bgr8` order, row-major, `3 * width` bytes per row.
    pub fn bgr_bytes(&self) -> Vec<u8> {
        self.image
            .pixels()
            .flat_map(|p| [p.0[2], p.0[1], p.0[0]])
            .collect()
    }
}

pub enum Message<'a> {
    Transform(&'a StampedTransform),
    Image(&'a StampedImage),
    PointCloud(&'a PointCloud),
}

pub trait Publisher {
    fn publish(&self, topic: &str, message: Message<'_>) -> Result<()>;
}
