use crate::error::SweepError;
use crate::numeric::lerp;
use tiltscan_data::{ServoTarget, SweepConfig, TravelRange};

/// Angles and step count of one sweep request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepRequest {
    pub from: f64,
    pub to: f64,
    pub standby: f64,
    pub steps: usize,
}

impl SweepRequest {
    pub fn from_config(config: &SweepConfig) -> SweepRequest {
        SweepRequest {
            from: config.start_angle,
            to: config.end_angle,
            standby: config.standby_angle,
            steps: config.steps,
        }
    }

    /// Checks that the request can be executed inside `travel`.
    pub fn validate(&self, travel: TravelRange) -> Result<(), SweepError> {
        if self.steps == 0 {
            return Err(SweepError::InvalidPlan(
                "a sweep needs at least one step".to_string(),
            ));
        }
        for (name, angle) in [("from", self.from), ("to", self.to), ("standby", self.standby)] {
            if !travel.contains(angle) {
                return Err(SweepError::InvalidPlan(format!(
                    "{name} angle {angle:.4} rad is outside of [{:.4}, {:.4}]",
                    travel.lower, travel.upper
                )));
            }
        }
        Ok(())
    }
}

/// Servo targets of one sweep, in the order they are visited.
///
/// Step `i` of `n` sits at `from + i/n * (to - from)`, so the plan starts at
/// `from` and stops one step short of `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepPlan {
    targets: Vec<ServoTarget>,
}

impl SweepPlan {
    pub fn linear(from: f64, to: f64, steps: usize, velocity: f64) -> SweepPlan {
        let targets = (0..steps)
            .map(|i| ServoTarget::new(lerp(from, to, i, steps), velocity))
            .collect();
        SweepPlan { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[ServoTarget] {
        &self.targets
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServoTarget> {
        self.targets.iter()
    }
}
