//! Bridge between an ORB-SLAM style engine and ROS.
//!
//! Every tick the [`bridge::node::Node`] pulls the current camera pose, the
//! rendered debug frame and the landmark map out of a [`engine::SlamEngine`],
//! converts them into the robot's frame conventions and hands them to a
//! [`transport::Publisher`].

pub mod bridge;
pub mod engine;
pub mod transport;

pub use bridge::error::{Error, Result};
