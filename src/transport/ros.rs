use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use nalgebra as na;
use rosrust_msg::sensor_msgs::PointField;
use rosrust_msg::*;

use super::{Message, Publisher, StampedImage, StampedTransform, TransformLookup};
use crate::bridge::error::{Error, Result};
use crate::bridge::params::{BridgeConfig, Reconfigurer, ReconfigureRequest};
use crate::bridge::projector::PointCloud;
use crate::bridge::transform::RigidTransform;
use crate::engine::SlamEngine;

const LOOKUP_POLL: Duration = Duration::from_millis(10);

pub fn to_ros_time(stamp: Duration) -> rosrust::Time {
    rosrust::Time::from_nanos(stamp.as_nanos() as i64)
}

pub fn now() -> Duration {
    Duration::from_nanos(rosrust::now().nanos().max(0) as u64)
}

fn param<T: serde::de::DeserializeOwned>(name: &str) -> Option<T> {
    rosrust::param(name)?.get().ok()
}

/// Overrides `config` with whatever private parameters are set on the
/// parameter server.
pub fn load_params(config: &mut BridgeConfig) {
    if let Some(v) = param("~publish_pointcloud") {
        config.publish_pointcloud = v;
    }
    if let Some(v) = param("~pointcloud_frame_id") {
        config.pointcloud_frame_id = v;
    }
    if let Some(v) = param("~camera_frame_id") {
        config.camera_frame_id = v;
    }
    if let Some(v) = param("~calibration_frame_id") {
        config.calibration_frame_id = v;
    }
    if let Some(v) = param("~calibration_timeout") {
        config.calibration_timeout_secs = v;
    }
    if let Some(v) = param("~publish_rate") {
        config.publish_rate_hz = v;
    }
    if let Some(v) = param("~localize_only") {
        config.localize_only = v;
    }
    if let Some(v) = param("~min_observations_for_ros_map") {
        config.min_observations_for_ros_map = v;
    }
    if let Some(v) = param("~min_num_kf_in_map") {
        config.min_num_kf_in_map = v;
    }
}

/// Applies JSON reconfiguration requests published on `~reconfigure`, e.g.
/// `{"localize_only": true, "min_observations_for_ros_map": 3}`.
pub fn subscribe_reconfigure<E>(reconfigurer: Reconfigurer<E>) -> Result<rosrust::Subscriber>
where
    E: SlamEngine + 'static,
{
    rosrust::subscribe("~reconfigure", 10, move |msg: std_msgs::String| {
        match ReconfigureRequest::from_json(&msg.data) {
            Ok(mut request) => {
                info!("reconfigure: {}", msg.data);
                reconfigurer.apply(&mut request);
            }
            Err(e) => warn!("ignoring reconfigure request {:?}: {}", msg.data, e),
        }
    })
    .map_err(|e| Error::Config(format!("cannot subscribe to ~reconfigure: {}", e)))
}

fn advertise<T: rosrust::Message>(topic: &str, queue_size: usize) -> Result<rosrust::Publisher<T>> {
    rosrust::publish(topic, queue_size).map_err(|e| Error::Publish {
        topic: topic.to_string(),
        reason: e.to_string(),
    })
}

pub struct RosTransport {
    tf_pub: rosrust::Publisher<tf2_msgs::TFMessage>,
    image_pub: rosrust::Publisher<sensor_msgs::Image>,
    cloud_pub: rosrust::Publisher<sensor_msgs::PointCloud2>,
    listener: tf_rosrust::TfListener,
    seq: AtomicU32,
}

impl RosTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tf_pub: advertise(super::TF_TOPIC, 100)?,
            image_pub: advertise(super::DEBUG_IMAGE_TOPIC, 1)?,
            cloud_pub: advertise(super::MAP_POINTS_TOPIC, 1)?,
            listener: tf_rosrust::TfListener::new(),
            seq: AtomicU32::new(0),
        })
    }

    fn header(&self, stamp: Duration, frame_id: &str) -> std_msgs::Header {
        std_msgs::Header {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            stamp: to_ros_time(stamp),
            frame_id: frame_id.to_string(),
        }
    }

    fn transform_msg(&self, tf: &StampedTransform) -> tf2_msgs::TFMessage {
        let q = tf.transform.quaternion();
        let t = tf.transform.translation;
        tf2_msgs::TFMessage {
            transforms: vec![geometry_msgs::TransformStamped {
                header: self.header(tf.stamp, &tf.parent_frame),
                child_frame_id: tf.child_frame.clone(),
                transform: geometry_msgs::Transform {
                    translation: geometry_msgs::Vector3 { x: t.x, y: t.y, z: t.z },
                    rotation: geometry_msgs::Quaternion {
                        x: q.i,
                        y: q.j,
                        z: q.k,
                        w: q.w,
                    },
                },
            }],
        }
    }

    fn image_msg(&self, img: &StampedImage) -> sensor_msgs::Image {
        let (width, height) = img.image.dimensions();
        sensor_msgs::Image {
            header: self.header(img.stamp, &img.frame_id),
            height,
            width,
            encoding: StampedImage::ENCODING.to_string(),
            is_bigendian: 0,
            step: 3 * width,
            data: img.bgr_bytes(),
        }
    }

    fn cloud_msg(&self, cloud: &PointCloud) -> sensor_msgs::PointCloud2 {
        sensor_msgs::PointCloud2 {
            header: self.header(cloud.stamp, &cloud.frame_id),
            height: cloud.height,
            width: cloud.width,
            fields: cloud
                .fields
                .iter()
                .map(|f| PointField {
                    name: f.name.clone(),
                    offset: f.offset,
                    datatype: f.datatype,
                    count: f.count,
                })
                .collect(),
            is_bigendian: cloud.is_bigendian,
            point_step: cloud.point_step,
            row_step: cloud.row_step,
            data: cloud.data.clone(),
            is_dense: cloud.is_dense,
        }
    }
}

impl Publisher for RosTransport {
    fn publish(&self, topic: &str, message: Message<'_>) -> Result<()> {
        let sent = match message {
            Message::Transform(tf) => self.tf_pub.send(self.transform_msg(tf)),
            Message::Image(img) => self.image_pub.send(self.image_msg(img)),
            Message::PointCloud(cloud) => self.cloud_pub.send(self.cloud_msg(cloud)),
        };
        sent.map_err(|e| Error::Publish {
            topic: topic.to_string(),
            reason: e.to_string(),
        })
    }
}

impl TransformLookup for RosTransport {
    /// Polls the tf buffer for the latest `parent <- child` transform until
    /// `timeout` runs out. A timeout too large for `Instant` waits forever.
    fn lookup_transform(
        &self,
        parent: &str,
        child: &str,
        timeout: Duration,
    ) -> Result<RigidTransform> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match self.listener.lookup_transform(parent, child, rosrust::Time::new()) {
                Ok(stamped) => {
                    let t = &stamped.transform;
                    let rotation = na::UnitQuaternion::from_quaternion(na::Quaternion::new(
                        t.rotation.w,
                        t.rotation.x,
                        t.rotation.y,
                        t.rotation.z,
                    ));
                    let translation =
                        na::Vector3::new(t.translation.x, t.translation.y, t.translation.z);
                    return Ok(RigidTransform::from_parts(translation, rotation));
                }
                Err(e) => {
                    let expired = deadline.map_or(false, |d| Instant::now() >= d);
                    if expired || !rosrust::is_ok() {
                        return Err(Error::TransformUnavailable {
                            parent: parent.to_string(),
                            child: child.to_string(),
                            reason: format!("{:?}", e),
                        });
                    }
                }
            }
            thread::sleep(LOOKUP_POLL);
        }
    }
}
