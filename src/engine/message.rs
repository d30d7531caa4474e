//! Line protocol spoken with an out-of-process engine.
//!
//! Engine to bridge, one message per line:
//!
//! ```text
//! pose r00 r01 r02 t0 r10 r11 r12 t1 r20 r21 r22 t2
//! lost
//! point <id> <x> <y> <z> <observations>
//! erase <id>
//! clear
//! ```
//!
//! Bridge to engine: `localize_only 0|1`, `reset`, `min_keyframes <n>`.

use std::fmt;
use std::str::{FromStr, SplitWhitespace};

use nalgebra as na;

use super::{Landmark, LandmarkId, Pose};
use crate::bridge::error::{Error, Result};
use crate::bridge::transform::RigidTransform;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Pose(Pose),
    Lost,
    Point(Landmark),
    Erase(LandmarkId),
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    LocalizationOnly(bool),
    Reset,
    MinKeyframes(u32),
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::LocalizationOnly(enabled) => {
                write!(f, "localize_only {}", *enabled as u8)
            }
            EngineCommand::Reset => write!(f, "reset"),
            EngineCommand::MinKeyframes(count) => write!(f, "min_keyframes {}", count),
        }
    }
}

fn malformed(line: &str, reason: impl Into<String>) -> Error {
    Error::Message {
        line: line.to_string(),
        reason: reason.into(),
    }
}

fn next<T: FromStr>(parts: &mut SplitWhitespace<'_>, line: &str, what: &str) -> Result<T> {
    let part = parts.next().ok_or_else(|| malformed(line, format!("missing {}", what)))?;
    part.parse::<T>().map_err(|_| malformed(line, format!("bad {} {:?}", what, part)))
}

pub fn parse_message(line: &str) -> Result<EngineMessage> {
    let mut parts = line.split_whitespace();
    let kind = parts.next().ok_or_else(|| malformed(line, "empty line"))?;

    let message = match kind {
        "pose" => {
            let values = parts
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|_| malformed(line, format!("bad pose value {:?}", v)))
                })
                .collect::<Result<Vec<_>>>()?;
            let pose = RigidTransform::from_row_slice_3x4(&values).ok_or_else(|| {
                malformed(line, format!("expected 12 pose values, got {}", values.len()))
            })?;
            return Ok(EngineMessage::Pose(pose));
        }
        "lost" => EngineMessage::Lost,
        "point" => {
            let id = next::<LandmarkId>(&mut parts, line, "id")?;
            let x = next::<f64>(&mut parts, line, "x")?;
            let y = next::<f64>(&mut parts, line, "y")?;
            let z = next::<f64>(&mut parts, line, "z")?;
            let observations = next::<u32>(&mut parts, line, "observations")?;
            EngineMessage::Point(Landmark::new(id, na::Vector3::new(x, y, z), observations))
        }
        "erase" => EngineMessage::Erase(next::<LandmarkId>(&mut parts, line, "id")?),
        "clear" => EngineMessage::Clear,
        other => return Err(malformed(line, format!("unknown message {:?}", other))),
    };

    if parts.next().is_some() {
        return Err(malformed(line, "trailing fields"));
    }
    Ok(message)
}
