#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One line of a 2-D laser range-finder.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserScan {
    /// Angle of the first beam in radian.
    pub angle_min: f32,
    /// Angle of the last beam in radian.
    pub angle_max: f32,
    /// Angular distance between two beams in radian.
    pub angle_increment: f32,
    /// Minimum valid range in meters.
    pub range_min: f32,
    /// Maximum valid range in meters.
    pub range_max: f32,
    /// Measured ranges in meters.
    pub ranges: Vec<f32>,
    /// Return strength of each beam. May be empty.
    pub intensities: Vec<f32>,
}

impl LaserScan {
    /// Number of beams in the line.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// A scan line as delivered by the sensor feed.
///
/// `seq` increases by at least one for every line the sensor emits, so two
/// samples with the same `seq` are the same line.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanSample {
    /// Sequence identifier assigned by the sensor feed.
    pub seq: u64,
    /// Acquisition time of the line.
    pub stamp: SystemTime,
    pub scan: LaserScan,
}

impl ScanSample {
    pub fn new(seq: u64, stamp: SystemTime, scan: LaserScan) -> ScanSample {
        ScanSample { seq, stamp, scan }
    }
}
