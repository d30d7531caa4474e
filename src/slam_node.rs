use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use orb_slam_bridge::bridge::node::Node;
use orb_slam_bridge::bridge::params::BridgeConfig;
use orb_slam_bridge::engine::camera::CameraIntrinsics;
use orb_slam_bridge::engine::remote::RemoteEngine;
use orb_slam_bridge::engine::replay::ReplayEngine;
use orb_slam_bridge::engine::SlamEngine;
use orb_slam_bridge::transport::ros::{self, RosTransport};

/// Republishes an ORB-SLAM engine's pose, debug image and map on ROS.
#[derive(Parser, Debug)]
#[command(name = "slam_node")]
struct Args {
    /// JSON file with node parameters; ROS private params override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a recorded run (trajectory.csv + landmarks.csv) instead of a
    /// live engine.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Address the live engine connects to.
    #[arg(long, default_value = "127.0.0.1:9123")]
    listen: String,
}

/// Runs the update loop until ROS shuts down or `finished` reports the engine
/// has nothing more to publish.
fn run<E, F>(engine: Arc<E>, config: &BridgeConfig, finished: F) -> Result<(), Box<dyn Error>>
where
    E: SlamEngine + 'static,
    F: Fn() -> bool,
{
    let transport = RosTransport::new()?;
    let mut node = Node::new(engine, transport, config);
    let _reconfigure = ros::subscribe_reconfigure(node.reconfigurer())?;

    // Create object that maintains the publish rate between sleep requests
    let rate = rosrust::rate(config.publish_rate_hz);

    // Breaks when a shutdown signal is sent
    while rosrust::is_ok() {
        if finished() {
            info!("replay finished");
            break;
        }
        node.update(ros::now());
        rate.sleep();
    }

    info!("shutting down");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Initialize node
    rosrust::init("orb_slam_bridge");
    let args = Args::parse_from(rosrust::args());

    let mut config = match &args.config {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    ros::load_params(&mut config);
    config.validate()?;
    info!("{:?}", config);

    let camera = CameraIntrinsics::new_euroc();
    match &args.replay {
        Some(dir) => {
            let engine = Arc::new(ReplayEngine::open(dir, camera)?);
            let replay = engine.clone();
            run(engine, &config, move || replay.finished())
        }
        None => {
            let engine = Arc::new(RemoteEngine::bind(args.listen.as_str(), camera)?);
            run(engine, &config, || false)
        }
    }
}
