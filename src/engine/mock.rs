use image::RgbImage;
use parking_lot::Mutex;

use super::{Landmark, Pose, SlamEngine};

/// In-memory engine that records every switch it receives.
#[derive(Default)]
pub struct MockEngine {
    pub pose: Mutex<Option<Pose>>,
    pub landmarks: Mutex<Vec<Landmark>>,
    pub localization_only: Mutex<Option<bool>>,
    pub min_keyframes: Mutex<Option<u32>>,
    pub resets: Mutex<usize>,
}

impl SlamEngine for MockEngine {
    fn current_pose(&self) -> Option<Pose> {
        *self.pose.lock()
    }

    fn landmarks(&self) -> Vec<Landmark> {
        self.landmarks.lock().clone()
    }

    fn rendered_frame(&self) -> RgbImage {
        RgbImage::new(4, 3)
    }

    fn set_localization_only(&self, enabled: bool) {
        *self.localization_only.lock() = Some(enabled);
    }

    fn reset(&self) {
        *self.resets.lock() += 1;
    }

    fn set_min_keyframes(&self, count: u32) {
        *self.min_keyframes.lock() = Some(count);
    }
}
