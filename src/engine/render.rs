use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::camera::CameraIntrinsics;
use super::{Landmark, Pose};

const TRACKING: Rgb<u8> = Rgb([0, 255, 0]);
const LOCALIZING: Rgb<u8> = Rgb([0, 128, 255]);
const LOST: Rgb<u8> = Rgb([255, 0, 0]);
const MAP_POINT: Rgb<u8> = Rgb([0, 255, 0]);
const BORDER: u32 = 3;

/// Debug view for engines that do not render one themselves: map points seen
/// from the current pose, framed by a border showing the tracking state.
#[derive(Debug, Clone)]
pub struct FrameDrawer {
    camera: CameraIntrinsics,
}

impl FrameDrawer {
    pub fn new(camera: CameraIntrinsics) -> Self {
        Self { camera }
    }

    pub fn draw(
        &self,
        pose: Option<&Pose>,
        landmarks: &[Landmark],
        localization_only: bool,
    ) -> RgbImage {
        let (width, height) = (self.camera.width.max(1), self.camera.height.max(1));
        let mut img = RgbImage::new(width, height);

        let border = match (pose, localization_only) {
            (None, _) => LOST,
            (Some(_), true) => LOCALIZING,
            (Some(_), false) => TRACKING,
        };

        if let Some(pose) = pose {
            for landmark in landmarks {
                let in_camera = pose.transform_point(&landmark.position);
                if let Some(px) = self.camera.project(&in_camera) {
                    draw_filled_circle_mut(&mut img, (px.x as i32, px.y as i32), 2, MAP_POINT);
                }
            }
        }

        for i in 0..BORDER.min(width / 2).min(height / 2) {
            let rect = Rect::at(i as i32, i as i32).of_size(width - 2 * i, height - 2 * i);
            draw_hollow_rect_mut(&mut img, rect, border);
        }

        img
    }
}
