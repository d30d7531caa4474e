use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use log::{debug, error};

use super::convert::FrameConverter;
use super::params::{BridgeConfig, Reconfigurer, ReconfigureRequest, RuntimeParams};
use super::projector;
use crate::engine::{Landmark, Pose, SlamEngine};
use crate::transport::{
    Message, Publisher, StampedImage, StampedTransform, TransformLookup, DEBUG_IMAGE_TOPIC,
    MAP_POINTS_TOPIC, TF_TOPIC,
};

/// Pulls pose, debug frame and map out of the engine and republishes them.
pub struct Node<E, T> {
    engine: Arc<E>,
    transport: T,
    params: Arc<RuntimeParams>,
    converter: FrameConverter,
    map_frame_id: String,
    camera_frame_id: String,
}

impl<E, T> Node<E, T>
where
    E: SlamEngine,
    T: TransformLookup + Publisher,
{
    /// Builds the node and pushes the startup parameters to the engine.
    pub fn new(engine: Arc<E>, transport: T, config: &BridgeConfig) -> Self {
        let params = Arc::new(RuntimeParams::from_config(config));
        let node = Self {
            engine,
            transport,
            params,
            converter: FrameConverter::new(
                config.calibration_frame_id.clone(),
                config.camera_frame_id.clone(),
                config.calibration_timeout(),
            ),
            map_frame_id: config.pointcloud_frame_id.clone(),
            camera_frame_id: config.camera_frame_id.clone(),
        };
        node.reconfigurer().apply(&mut ReconfigureRequest::from_config(config));
        node
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn reconfigurer(&self) -> Reconfigurer<E> {
        Reconfigurer::new(self.engine.clone(), self.params.clone())
    }

    /// One publish cycle stamped with `stamp`.
    pub fn update(&mut self, stamp: Duration) {
        match self.engine.current_pose() {
            Some(pose) => self.publish_position_as_transform(&pose, stamp),
            None => debug!("no pose from engine, skipping transform"),
        }

        self.publish_rendered_image(self.engine.rendered_frame(), stamp);

        if self.params.publish_pointcloud() {
            self.publish_map_points(&self.engine.landmarks(), stamp);
        }
    }

    fn publish_position_as_transform(&mut self, pose: &Pose, stamp: Duration) {
        let transform = self.converter.convert(pose, &self.transport);
        let stamped = StampedTransform {
            stamp,
            parent_frame: self.map_frame_id.clone(),
            child_frame: self.camera_frame_id.clone(),
            transform,
        };
        self.send(TF_TOPIC, Message::Transform(&stamped));
    }

    fn publish_rendered_image(&self, image: RgbImage, stamp: Duration) {
        let stamped = StampedImage {
            stamp,
            frame_id: self.map_frame_id.clone(),
            image,
        };
        self.send(DEBUG_IMAGE_TOPIC, Message::Image(&stamped));
    }

    fn publish_map_points(&self, landmarks: &[Landmark], stamp: Duration) {
        let min_observations = self.params.min_observations();
        let cloud = projector::project(landmarks, min_observations, &self.map_frame_id, stamp);
        self.send(MAP_POINTS_TOPIC, Message::PointCloud(&cloud));
    }

    fn send(&self, topic: &str, message: Message<'_>) {
        if let Err(e) = self.transport.publish(topic, message) {
            error!("{}", e);
        }
    }
}
