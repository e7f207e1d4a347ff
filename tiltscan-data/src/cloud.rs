#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// A single point of an assembled cloud.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
}

/// 3-D point cloud produced by the cloud assembler.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    pub stamp: SystemTime,
    pub points: Vec<Point3>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Time interval bracketing one sweep.
///
/// Every scan line republished during the sweep was published inside
/// `[begin, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SweepWindow {
    pub begin: SystemTime,
    pub end: SystemTime,
}

impl SweepWindow {
    pub fn contains(&self, stamp: SystemTime) -> bool {
        self.begin <= stamp && stamp <= self.end
    }

    /// Length of the window, zero if the clock went backwards.
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.begin).unwrap_or(Duration::ZERO)
    }
}
