use std::time::Duration;

use log::warn;

use super::convert::orb_to_ros;
use crate::engine::Landmark;

/// `sensor_msgs/PointField` datatype code for float32.
pub const FLOAT32: u8 = 7;

const CHANNELS: [&str; 3] = ["x", "y", "z"];
const FLOAT_SIZE: u32 = std::mem::size_of::<f32>() as u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    pub datatype: u8,
    pub count: u32,
}

/// Unorganised xyz cloud laid out like `sensor_msgs/PointCloud2`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub stamp: Duration,
    pub frame_id: String,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub data: Vec<u8>,
    pub is_dense: bool,
}

impl PointCloud {
    pub fn xyz(frame_id: &str, stamp: Duration, points: &[[f32; 3]]) -> Self {
        let point_step = CHANNELS.len() as u32 * FLOAT_SIZE;
        let fields = CHANNELS
            .iter()
            .enumerate()
            .map(|(i, name)| PointField {
                name: name.to_string(),
                offset: i as u32 * FLOAT_SIZE,
                datatype: FLOAT32,
                count: 1,
            })
            .collect();
        let data = points
            .iter()
            .flat_map(|p| p.iter().flat_map(|v| v.to_le_bytes()))
            .collect();

        Self {
            stamp,
            frame_id: frame_id.to_string(),
            height: 1,
            width: points.len() as u32,
            fields,
            is_bigendian: false,
            point_step,
            row_step: point_step * points.len() as u32,
            data,
            is_dense: true,
        }
    }

    pub fn len(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.data.chunks_exact(self.point_step as usize).map(|chunk| {
            let read = |i: usize| {
                let offset = i * FLOAT_SIZE as usize;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&chunk[offset..offset + 4]);
                f32::from_le_bytes(bytes)
            };
            [read(0), read(1), read(2)]
        })
    }
}

/// Keeps landmarks seen at least `min_observations` times, in input order,
/// with positions permuted into ROS axes.
pub fn project(
    landmarks: &[Landmark],
    min_observations: u32,
    frame_id: &str,
    stamp: Duration,
) -> PointCloud {
    if landmarks.is_empty() {
        warn!("Map point vector is empty!");
    }

    let p = orb_to_ros();
    let points = landmarks
        .iter()
        .filter(|l| l.observations >= min_observations)
        .map(|l| {
            let v = p * l.position;
            [v.x as f32, v.y as f32, v.z as f32]
        })
        .collect::<Vec<_>>();

    PointCloud::xyz(frame_id, stamp, &points)
}
