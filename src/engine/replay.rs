use std::fs;
use std::path::Path;
use std::time::{self, Instant};

use image::RgbImage;
use log::{info, warn};
use nalgebra as na;
use parking_lot::Mutex;
use serde::Deserialize;

use super::camera::CameraIntrinsics;
use super::render::FrameDrawer;
use super::{Landmark, LandmarkId, Pose, SlamEngine};
use crate::bridge::error::Result;
use crate::bridge::transform::RigidTransform;

pub const TRAJECTORY_FILE: &str = "trajectory.csv";
pub const LANDMARKS_FILE: &str = "landmarks.csv";

pub struct TrajectoryRecord {
    pub timestamp: time::Duration,
    /// `None` where the engine had lost tracking.
    pub pose: Option<Pose>,
}

#[derive(Deserialize)]
struct LandmarkRecord {
    id: LandmarkId,
    x: f64,
    y: f64,
    z: f64,
    observations: u32,
}

/// Reads `timestamp_ns` followed by a row-major 3x4 `[R | t]`. Rows whose pose
/// columns are empty are lost-tracking samples.
pub fn load_trajectory(path: impl AsRef<Path>) -> Result<Vec<TrajectoryRecord>> {
    let file = fs::File::open(path.as_ref())?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut trajectory = Vec::new();
    for record in reader.records() {
        let line = record?;
        let timestamp = match line.get(0).map(str::parse::<u64>) {
            Some(Ok(timestamp)) => time::Duration::from_nanos(timestamp),
            _ => {
                warn!("skipping trajectory row {:?}: bad timestamp", line);
                continue;
            }
        };

        let values = line.iter().skip(1).filter(|f| !f.is_empty()).collect::<Vec<_>>();
        let pose = if values.is_empty() {
            None
        } else {
            let parsed = values
                .iter()
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>();
            match parsed.ok().as_deref().and_then(RigidTransform::from_row_slice_3x4) {
                Some(pose) => Some(pose),
                None => {
                    warn!("skipping trajectory row {:?}: expected 12 pose values", line);
                    continue;
                }
            }
        };

        trajectory.push(TrajectoryRecord { timestamp, pose });
    }

    trajectory.sort_by_key(|r| r.timestamp);
    Ok(trajectory)
}

pub fn load_landmarks(path: impl AsRef<Path>) -> Result<Vec<Landmark>> {
    let file = fs::File::open(path.as_ref())?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut landmarks = Vec::new();
    for record in reader.deserialize::<LandmarkRecord>() {
        let r = record?;
        landmarks.push(Landmark::new(r.id, na::Vector3::new(r.x, r.y, r.z), r.observations));
    }
    Ok(landmarks)
}

struct PlaybackState {
    started: Instant,
    localization_only: bool,
    min_keyframes: u32,
}

/// Plays a recorded run back in real time.
pub struct ReplayEngine {
    trajectory: Vec<TrajectoryRecord>,
    landmarks: Vec<Landmark>,
    drawer: FrameDrawer,
    state: Mutex<PlaybackState>,
}

impl ReplayEngine {
    pub fn new(
        mut trajectory: Vec<TrajectoryRecord>,
        landmarks: Vec<Landmark>,
        camera: CameraIntrinsics,
    ) -> Self {
        trajectory.sort_by_key(|r| r.timestamp);
        Self {
            trajectory,
            landmarks,
            drawer: FrameDrawer::new(camera),
            state: Mutex::new(PlaybackState {
                started: Instant::now(),
                localization_only: false,
                min_keyframes: 0,
            }),
        }
    }

    /// Loads `trajectory.csv` and `landmarks.csv` from `dir`.
    pub fn open(dir: impl AsRef<Path>, camera: CameraIntrinsics) -> Result<Self> {
        let dir = dir.as_ref();
        let trajectory = load_trajectory(dir.join(TRAJECTORY_FILE))?;
        let landmarks = load_landmarks(dir.join(LANDMARKS_FILE))?;
        info!(
            "replaying {} poses and {} landmarks from {}",
            trajectory.len(),
            landmarks.len(),
            dir.display()
        );
        Ok(Self::new(trajectory, landmarks, camera))
    }

    /// Pose recorded at `elapsed` after the first sample.
    pub fn pose_at(&self, elapsed: time::Duration) -> Option<Pose> {
        let first = self.trajectory.first()?.timestamp;
        let idx = self.trajectory.partition_point(|r| r.timestamp - first <= elapsed);
        self.trajectory[..idx].last().and_then(|r| r.pose)
    }

    pub fn duration(&self) -> time::Duration {
        match (self.trajectory.first(), self.trajectory.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => time::Duration::ZERO,
        }
    }

    fn elapsed(&self) -> time::Duration {
        self.state.lock().started.elapsed()
    }

    /// True once playback has run past the last recorded sample.
    pub fn finished(&self) -> bool {
        self.elapsed() > self.duration()
    }

    pub fn localization_only(&self) -> bool {
        self.state.lock().localization_only
    }

    pub fn min_keyframes(&self) -> u32 {
        self.state.lock().min_keyframes
    }
}

impl SlamEngine for ReplayEngine {
    fn current_pose(&self) -> Option<Pose> {
        self.pose_at(self.elapsed())
    }

    fn landmarks(&self) -> Vec<Landmark> {
        self.landmarks.clone()
    }

    fn rendered_frame(&self) -> RgbImage {
        let pose = self.current_pose();
        self.drawer.draw(pose.as_ref(), &self.landmarks, self.localization_only())
    }

    fn set_localization_only(&self, enabled: bool) {
        self.state.lock().localization_only = enabled;
    }

    fn reset(&self) {
        info!("restarting playback");
        self.state.lock().started = Instant::now();
    }

    fn set_min_keyframes(&self, count: u32) {
        self.state.lock().min_keyframes = count;
    }
}
