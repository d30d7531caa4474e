use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbImage;
use log::{error, info, warn};
use parking_lot::{Mutex, MutexGuard};

use super::camera::CameraIntrinsics;
use super::message::{parse_message, EngineCommand, EngineMessage};
use super::render::FrameDrawer;
use super::{Landmark, LandmarkId, Pose, SlamEngine};
use crate::bridge::error::Result;

const QUEUE_SIZE: usize = 4096;

#[derive(Default)]
struct RemoteMap {
    pose: Option<Pose>,
    landmarks: BTreeMap<LandmarkId, Landmark>,
    localization_only: bool,
}

impl RemoteMap {
    fn apply(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Pose(pose) => self.pose = Some(pose),
            EngineMessage::Lost => self.pose = None,
            EngineMessage::Point(landmark) => {
                self.landmarks.insert(landmark.id, landmark);
            }
            EngineMessage::Erase(id) => {
                self.landmarks.remove(&id);
            }
            EngineMessage::Clear => self.landmarks.clear(),
        }
    }
}

/// Engine running in another process, connected over TCP.
///
/// A background thread accepts one engine at a time and forwards its parsed
/// messages through a bounded channel; every query drains the channel first.
/// Mode switches are written back on the same connection.
pub struct RemoteEngine {
    receiver: Receiver<EngineMessage>,
    writer: Arc<Mutex<Option<TcpStream>>>,
    map: Mutex<RemoteMap>,
    drawer: FrameDrawer,
    local_addr: SocketAddr,
}

/// Returns `false` once nobody is listening on `tx` any more.
fn handle_client(stream: TcpStream, tx: &Sender<EngineMessage>) -> bool {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                error!("Error reading from socket: {}", err);
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(_) => {
                warn!("skipping non-UTF-8 line {:?}", String::from_utf8_lossy(&buf));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_message(line) {
            Ok(message) => {
                if tx.send(message).is_err() {
                    return false;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
    tx.send(EngineMessage::Lost).is_ok()
}

impl RemoteEngine {
    pub fn bind(addr: impl ToSocketAddrs, camera: CameraIntrinsics) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        info!("waiting for engine on {}", local_addr);

        let (tx, rx) = bounded::<EngineMessage>(QUEUE_SIZE);
        let writer = Arc::new(Mutex::new(None));
        let accept_writer = writer.clone();

        thread::Builder::new().name("engine-link".into()).spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        info!("engine connected from {:?}", stream.peer_addr());
                        match stream.try_clone() {
                            Ok(w) => *accept_writer.lock() = Some(w),
                            Err(err) => warn!("engine commands disabled: {}", err),
                        }
                        let listening = handle_client(stream, &tx);
                        *accept_writer.lock() = None;
                        info!("engine disconnected");
                        if !listening {
                            break;
                        }
                    }
                    Err(err) => {
                        error!("Error accepting connection: {}", err);
                    }
                }
            }
        })?;

        Ok(Self {
            receiver: rx,
            writer,
            map: Mutex::new(RemoteMap::default()),
            drawer: FrameDrawer::new(camera),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connected(&self) -> bool {
        self.writer.lock().is_some()
    }

    fn sync(&self) -> MutexGuard<'_, RemoteMap> {
        let mut map = self.map.lock();
        for message in self.receiver.try_iter() {
            map.apply(message);
        }
        map
    }

    fn send_command(&self, command: EngineCommand) {
        let mut writer = self.writer.lock();
        match writer.as_mut() {
            Some(stream) => {
                if let Err(e) = writeln!(stream, "{}", command) {
                    warn!("failed to send {:?} to engine: {}", command, e);
                }
            }
            None => warn!("no engine connected, dropping {:?}", command),
        }
    }
}

impl SlamEngine for RemoteEngine {
    fn current_pose(&self) -> Option<Pose> {
        self.sync().pose
    }

    fn landmarks(&self) -> Vec<Landmark> {
        self.sync().landmarks.values().cloned().collect()
    }

    fn rendered_frame(&self) -> RgbImage {
        let map = self.sync();
        let landmarks = map.landmarks.values().cloned().collect::<Vec<_>>();
        self.drawer.draw(map.pose.as_ref(), &landmarks, map.localization_only)
    }

    fn set_localization_only(&self, enabled: bool) {
        self.sync().localization_only = enabled;
        self.send_command(EngineCommand::LocalizationOnly(enabled));
    }

    fn reset(&self) {
        {
            let mut map = self.sync();
            map.pose = None;
            map.landmarks.clear();
        }
        self.send_command(EngineCommand::Reset);
    }

    fn set_min_keyframes(&self, count: u32) {
        self.send_command(EngineCommand::MinKeyframes(count));
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpStream;
    use std::time::{Duration, Instant};

    use nalgebra as na;

    use super::*;

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn map_updates_from_stream() {
        let mut map = RemoteMap::default();
        map.apply(EngineMessage::Point(Landmark::new(3, na::Vector3::new(1.0, 1.0, 1.0), 2)));
        map.apply(EngineMessage::Point(Landmark::new(1, na::Vector3::new(2.0, 2.0, 2.0), 2)));
        map.apply(EngineMessage::Point(Landmark::new(3, na::Vector3::new(3.0, 3.0, 3.0), 5)));
        assert_eq!(map.landmarks.len(), 2);
        assert_eq!(map.landmarks[&3].observations, 5);
        map.apply(EngineMessage::Erase(1));
        assert_eq!(map.landmarks.keys().copied().collect::<Vec<_>>(), vec![3]);
        map.apply(EngineMessage::Clear);
        assert!(map.landmarks.is_empty());
    }

    #[test]
    fn receives_state_and_sends_commands() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let engine = RemoteEngine::bind("127.0.0.1:0", CameraIntrinsics::new_euroc())?;
        let mut client = TcpStream::connect(engine.local_addr())?;
        writeln!(client, "point 1 0 0 2 3")?;
        writeln!(client, "garbage line")?;
        writeln!(client, "pose 1 0 0 0 0 1 0 0 0 0 1 0.5")?;
        client.flush()?;

        assert!(wait_for(|| engine.current_pose().is_some()));
        assert_eq!(engine.current_pose().map(|p| p.translation.z), Some(0.5));
        assert_eq!(engine.landmarks().len(), 1);
        assert!(engine.connected());

        engine.set_localization_only(true);
        engine.set_min_keyframes(6);
        engine.reset();
        assert!(engine.landmarks().is_empty());

        client.set_read_timeout(Some(Duration::from_secs(5)))?;
        let mut reader = BufReader::new(client.try_clone()?);
        let mut lines = Vec::new();
        for _ in 0..3 {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            lines.push(line.trim_end().to_string());
        }
        assert_eq!(lines, vec!["localize_only 1", "min_keyframes 6", "reset"]);

        drop(reader);
        drop(client);
        assert!(wait_for(|| !engine.connected()));
        assert!(engine.current_pose().is_none());
        Ok(())
    }

    #[test]
    fn invalid_utf8_line_keeps_connection() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let engine = RemoteEngine::bind("127.0.0.1:0", CameraIntrinsics::new_euroc())?;
        let mut client = TcpStream::connect(engine.local_addr())?;
        client.write_all(b"point 2 \xff\xfe 1 2 3\n")?;
        writeln!(client, "point 4 1 1 1 2")?;
        writeln!(client, "pose 1 0 0 0 0 1 0 0 0 0 1 0.5")?;
        client.flush()?;

        assert!(wait_for(|| engine.current_pose().is_some()));
        assert!(engine.connected());
        let ids = engine.landmarks().iter().map(|l| l.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![4]);
        Ok(())
    }

    #[test]
    fn commands_without_engine_are_dropped() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let engine = RemoteEngine::bind("127.0.0.1:0", CameraIntrinsics::new_euroc())?;
        engine.set_min_keyframes(3);
        assert!(!engine.connected());
        assert!(engine.landmarks().is_empty());
        Ok(())
    }
}
