#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Commanded servo position.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoTarget {
    /// Target angle in radian.
    pub angle: f64,
    /// Target velocity in radian per second. Must be positive.
    pub velocity: f64,
}

impl ServoTarget {
    pub fn new(angle: f64, velocity: f64) -> ServoTarget {
        ServoTarget { angle, velocity }
    }
}

/// Request sent to the servo device service.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoCommand {
    /// Name of the joint that tilts the scanner.
    pub joint_name: String,
    pub target: ServoTarget,
}

/// Mechanically valid travel of the tilt joint.
///
/// The two ends are kept as the mechanism names them: `upper` is the
/// scanner's top position (50° on the reference unit) and `lower` the bottom
/// one (-60°). Either may be numerically larger.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TravelRange {
    /// Upper end of travel in radian.
    pub upper: f64,
    /// Lower end of travel in radian.
    pub lower: f64,
}

impl TravelRange {
    pub fn new(upper: f64, lower: f64) -> TravelRange {
        TravelRange { upper, lower }
    }

    /// Returns true if `angle` lies between both ends, inclusive.
    pub fn contains(&self, angle: f64) -> bool {
        let (lo, hi) = if self.upper < self.lower {
            (self.upper, self.lower)
        } else {
            (self.lower, self.upper)
        };
        lo <= angle && angle <= hi
    }
}
