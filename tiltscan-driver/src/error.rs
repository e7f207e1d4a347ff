use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single servo command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("Servo joint \"{joint}\" did not complete the move to {angle:.4} rad: {reason}")]
    ServoUnreachable {
        joint: String,
        angle: f64,
        reason: String,
    },
    #[error("Target angle {angle:.4} rad is outside of the travel range [{lower:.4}, {upper:.4}]")]
    OutOfRange { angle: f64, lower: f64, upper: f64 },
    #[error("Target velocity must be positive. Actually {0}.")]
    InvalidVelocity(f64),
}

/// No fresh scan pair arrived in time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No scan newer than {} arrived within {} ms", display_marker(.marker), .waited.as_millis())]
pub struct SensorTimeout {
    /// How long the synchronizer waited.
    pub waited: Duration,
    /// Publish marker at the time of the timeout.
    pub marker: Option<u64>,
}

fn display_marker(marker: &Option<u64>) -> String {
    match marker {
        Some(seq) => format!("#{seq}"),
        None => "the start of the feed".to_string(),
    }
}

/// Point of the sweep at which a servo move was commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    /// Move to the first angle of the sweep.
    Start,
    /// Zero-based step of the sweep plan.
    Step { index: usize },
    /// Move to the standby position after assembly.
    Park,
}

impl fmt::Display for SweepPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SweepPhase::Start => write!(f, "start position"),
            SweepPhase::Step { index } => write!(f, "step {index}"),
            SweepPhase::Park => write!(f, "standby position"),
        }
    }
}

/// Failure of a whole sweep request.
///
/// Every variant aborts the sweep. Scans published before the failure stay
/// published; no point cloud is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    #[error("A sweep is already in progress")]
    Busy,
    #[error("Invalid sweep plan: {0}")]
    InvalidPlan(String),
    #[error("Motion to {phase} failed after {steps_completed} completed steps: {source}")]
    Motion {
        phase: SweepPhase,
        steps_completed: usize,
        #[source]
        source: MotionError,
    },
    #[error("Sensor timed out at step {step} after {steps_completed} completed steps: {source}")]
    SensorTimeout {
        step: usize,
        steps_completed: usize,
        #[source]
        source: SensorTimeout,
    },
    #[error("Cloud assembly failed: {reason}")]
    AssemblyFailed { reason: String },
}

impl SweepError {
    /// Number of sweep steps that finished before the failure.
    pub fn steps_completed(&self) -> usize {
        match self {
            SweepError::Motion {
                steps_completed, ..
            }
            | SweepError::SensorTimeout {
                steps_completed, ..
            } => *steps_completed,
            _ => 0,
        }
    }
}
