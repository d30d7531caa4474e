use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use crate::engine::SlamEngine;

/// Node parameters. Every field falls back to its default when missing from
/// the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub publish_pointcloud: bool,
    pub pointcloud_frame_id: String,
    pub camera_frame_id: String,
    /// Parent frame of the calibration lookup; the child is `camera_frame_id`.
    pub calibration_frame_id: String,
    pub calibration_timeout_secs: f64,
    pub publish_rate_hz: f64,
    pub localize_only: bool,
    pub min_observations_for_ros_map: u32,
    pub min_num_kf_in_map: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            publish_pointcloud: true,
            pointcloud_frame_id: "map".to_string(),
            camera_frame_id: "odom".to_string(),
            calibration_frame_id: "head_camera_link".to_string(),
            calibration_timeout_secs: 1.0,
            publish_rate_hz: 20.0,
            localize_only: false,
            min_observations_for_ros_map: 2,
            min_num_kf_in_map: 5,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&contents)?;
        info!("loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if Duration::try_from_secs_f64(self.calibration_timeout_secs).is_err() {
            return Err(Error::Config(format!(
                "calibration_timeout_secs must be a non-negative duration, got {}",
                self.calibration_timeout_secs
            )));
        }
        if !(self.publish_rate_hz.is_finite() && self.publish_rate_hz > 0.0) {
            return Err(Error::Config(format!(
                "publish_rate_hz must be positive, got {}",
                self.publish_rate_hz
            )));
        }
        Ok(())
    }

    /// Saturates values `validate` would reject.
    pub fn calibration_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.calibration_timeout_secs).unwrap_or(
            if self.calibration_timeout_secs > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            },
        )
    }
}

/// Parameters that may change while the node runs. Each one is a single
/// atomic so the update tick reads them without locking.
#[derive(Debug)]
pub struct RuntimeParams {
    publish_pointcloud: AtomicBool,
    localize_only: AtomicBool,
    min_observations: AtomicU32,
    min_keyframes: AtomicU32,
}

impl RuntimeParams {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            publish_pointcloud: AtomicBool::new(config.publish_pointcloud),
            localize_only: AtomicBool::new(config.localize_only),
            min_observations: AtomicU32::new(config.min_observations_for_ros_map),
            min_keyframes: AtomicU32::new(config.min_num_kf_in_map),
        }
    }

    pub fn publish_pointcloud(&self) -> bool {
        self.publish_pointcloud.load(Ordering::Relaxed)
    }

    pub fn set_publish_pointcloud(&self, enabled: bool) {
        self.publish_pointcloud.store(enabled, Ordering::Relaxed);
    }

    pub fn localize_only(&self) -> bool {
        self.localize_only.load(Ordering::Relaxed)
    }

    pub fn min_observations(&self) -> u32 {
        self.min_observations.load(Ordering::Relaxed)
    }

    pub fn set_min_observations(&self, count: u32) {
        self.min_observations.store(count, Ordering::Relaxed);
    }

    pub fn min_keyframes(&self) -> u32 {
        self.min_keyframes.load(Ordering::Relaxed)
    }
}

/// A reconfiguration request. Absent fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconfigureRequest {
    pub publish_pointcloud: Option<bool>,
    pub localize_only: Option<bool>,
    pub min_observations_for_ros_map: Option<u32>,
    pub min_num_kf_in_map: Option<u32>,
    pub reset_map: bool,
}

impl ReconfigureRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Request that re-applies the startup configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            publish_pointcloud: Some(config.publish_pointcloud),
            localize_only: Some(config.localize_only),
            min_observations_for_ros_map: Some(config.min_observations_for_ros_map),
            min_num_kf_in_map: Some(config.min_num_kf_in_map),
            reset_map: false,
        }
    }
}

/// Applies reconfiguration requests. Cheap to clone and safe to move into a
/// subscriber callback running on another thread.
pub struct Reconfigurer<E> {
    engine: Arc<E>,
    params: Arc<RuntimeParams>,
}

impl<E> Clone for Reconfigurer<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            params: self.params.clone(),
        }
    }
}

impl<E: SlamEngine> Reconfigurer<E> {
    pub fn new(engine: Arc<E>, params: Arc<RuntimeParams>) -> Self {
        Self { engine, params }
    }

    /// Forwards engine switches, stores local values and clears the one-shot
    /// `reset_map` flag once the reset has been sent.
    pub fn apply(&self, request: &mut ReconfigureRequest) {
        if let Some(enabled) = request.publish_pointcloud {
            self.params.set_publish_pointcloud(enabled);
        }

        if let Some(enabled) = request.localize_only {
            self.params.localize_only.store(enabled, Ordering::Relaxed);
            self.engine.set_localization_only(enabled);
        }

        if let Some(count) = request.min_observations_for_ros_map {
            self.params.set_min_observations(count);
        }

        if request.reset_map {
            info!("resetting map");
            self.engine.reset();
            request.reset_map = false;
        }

        if let Some(count) = request.min_num_kf_in_map {
            self.params.min_keyframes.store(count, Ordering::Relaxed);
            self.engine.set_min_keyframes(count);
        }
    }
}
