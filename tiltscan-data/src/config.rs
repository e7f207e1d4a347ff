use crate::servo::TravelRange;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper end of the tilt travel in degree.
pub const UPPER_POSITION_DEG: f64 = 50.;
/// Lower end of the tilt travel in degree.
pub const LOWER_POSITION_DEG: f64 = -60.;
/// Parking position between two sweeps in degree.
pub const STANDBY_POSITION_DEG: f64 = 20.;
/// Number of discrete servo positions per sweep.
pub const DEFAULT_STEPS: usize = 1000;
/// Joint driven by the servo on the reference unit.
pub const DEFAULT_JOINT_NAME: &str = "drehobjekt_1_to_balken_1";

/// Parameters of a sweep.
///
/// `Default` reproduces the reference unit: the sweep starts at the upper end,
/// descends towards the lower end and parks at 20°.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SweepConfig {
    /// Joint name sent with every servo command.
    pub joint_name: String,
    /// Mechanical limits of the tilt joint in radian.
    pub travel: TravelRange,
    /// First angle of the sweep in radian.
    pub start_angle: f64,
    /// Angle the sweep heads towards in radian. Never reached exactly.
    pub end_angle: f64,
    /// Parking angle in radian.
    pub standby_angle: f64,
    /// Number of servo positions in one sweep.
    pub steps: usize,
    /// Velocity of the initial move to `start_angle`.
    pub start_velocity: f64,
    /// Velocity of every sweep step.
    pub step_velocity: f64,
    /// Velocity of the parking move.
    pub park_velocity: f64,
    /// Rate at which the buffer is re-checked while waiting for fresh scans.
    pub poll_rate_hz: f64,
    /// Longest wait for a fresh scan pair after one servo step.
    pub settle_timeout_ms: u64,
}

impl SweepConfig {
    /// Interval between two buffer checks while waiting for fresh scans.
    ///
    /// Never longer than the settle timeout. Rates that are not positive and
    /// finite fall back to 10 ms.
    pub fn poll_interval(&self) -> Duration {
        let interval = if self.poll_rate_hz > 0. && self.poll_rate_hz.is_finite() {
            Duration::try_from_secs_f64(1. / self.poll_rate_hz).unwrap_or(Duration::MAX)
        } else {
            Duration::from_millis(10)
        };
        interval.min(self.settle_timeout())
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        let upper = UPPER_POSITION_DEG.to_radians();
        let lower = LOWER_POSITION_DEG.to_radians();
        SweepConfig {
            joint_name: DEFAULT_JOINT_NAME.to_string(),
            travel: TravelRange::new(upper, lower),
            start_angle: upper,
            end_angle: lower,
            standby_angle: STANDBY_POSITION_DEG.to_radians(),
            steps: DEFAULT_STEPS,
            start_velocity: 1.5,
            step_velocity: 0.5,
            park_velocity: 1.0,
            poll_rate_hz: 150.,
            settle_timeout_ms: 2000,
        }
    }
}
