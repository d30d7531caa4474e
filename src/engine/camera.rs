use nalgebra as na;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,

    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// cam0 of the EuRoC MAV dataset.
    pub fn new_euroc() -> Self {
        Self { width: 752, height: 480, fx: 458.654, fy: 457.296, cx: 367.215, cy: 248.375 }
    }

    /// Pixel coordinates of a camera-frame point, `None` behind the camera or
    /// outside the image.
    pub fn project(&self, point: &na::Vector3<f64>) -> Option<na::Point2<f64>> {
        if point.z <= 0.0 {
            return None;
        }
        let u = self.fx * point.x / point.z + self.cx;
        let v = self.fy * point.y / point.z + self.cy;
        if u < 0.0 || v < 0.0 || u >= self.width as f64 || v >= self.height as f64 {
            return None;
        }
        Some(na::Point2::new(u, v))
    }
}
