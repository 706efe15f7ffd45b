//! Hand landmark frames as delivered by the capture collaborator.

use serde::Deserialize;
use thiserror::Error;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// (tip, pip) pairs for the four non-thumb fingers, index first.
pub const FINGERS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

/// One normalized joint position. `z` is carried for completeness but ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    #[cfg(test)]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance; depth is not part of the model.
    pub fn dist(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("expected 21 landmarks, got {0}")]
    WrongCount(usize),
    #[error("landmark {0} has a non-finite coordinate")]
    NonFinite(usize),
}

/// A single hand sample. "No hand" is `Option::<LandmarkFrame>::None`,
/// never a zeroed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: [Landmark; LANDMARK_COUNT],
}

impl LandmarkFrame {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Result<Self, FrameError> {
        if let Some(i) = points
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(FrameError::NonFinite(i));
        }
        Ok(Self { points })
    }

    pub fn from_slice(points: &[Landmark]) -> Result<Self, FrameError> {
        let arr: [Landmark; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| FrameError::WrongCount(points.len()))?;
        Self::new(arr)
    }

    pub fn get(&self, joint: usize) -> &Landmark {
        &self.points[joint]
    }

    pub fn wrist(&self) -> &Landmark {
        &self.points[WRIST]
    }
}

// ── Test helpers ───────────────────────────────────────────
