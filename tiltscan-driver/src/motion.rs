use crate::error::MotionError;
use tiltscan_data::{ServoCommand, ServoTarget, TravelRange};
use tracing::{debug, error};

/// Servo device service.
///
/// `command` must block until the device reports that the joint reached the
/// target, and must be callable repeatedly. The error string is the device's
/// own description of the failure.
pub trait ServoDevice: Send + Sync {
    fn command(&self, command: &ServoCommand) -> Result<(), String>;
}

impl<T: ServoDevice + ?Sized> ServoDevice for Box<T> {
    fn command(&self, command: &ServoCommand) -> Result<(), String> {
        (**self).command(command)
    }
}

impl<T: ServoDevice + ?Sized> ServoDevice for std::sync::Arc<T> {
    fn command(&self, command: &ServoCommand) -> Result<(), String> {
        (**self).command(command)
    }
}

/// Moves the tilt joint and blocks until the move is complete.
pub struct MotionController<S> {
    servo: S,
    joint_name: String,
    travel: TravelRange,
}

impl<S: ServoDevice> MotionController<S> {
    pub fn new(servo: S, joint_name: impl Into<String>, travel: TravelRange) -> Self {
        MotionController {
            servo,
            joint_name: joint_name.into(),
            travel,
        }
    }

    pub fn travel(&self) -> TravelRange {
        self.travel
    }

    /// Commands one move. A device failure is not retried.
    pub fn move_to(&self, target: ServoTarget) -> Result<(), MotionError> {
        self.validate(target)?;

        let command = ServoCommand {
            joint_name: self.joint_name.clone(),
            target,
        };
        match self.servo.command(&command) {
            Ok(()) => {
                debug!(
                    joint = %self.joint_name,
                    angle = target.angle,
                    velocity = target.velocity,
                    "movement finished"
                );
                Ok(())
            }
            Err(reason) => {
                error!(joint = %self.joint_name, angle = target.angle, %reason, "servo command failed");
                Err(MotionError::ServoUnreachable {
                    joint: self.joint_name.clone(),
                    angle: target.angle,
                    reason,
                })
            }
        }
    }

    fn validate(&self, target: ServoTarget) -> Result<(), MotionError> {
        if !self.travel.contains(target.angle) {
            return Err(MotionError::OutOfRange {
                angle: target.angle,
                lower: self.travel.lower,
                upper: self.travel.upper,
            });
        }
        // Also rejects NaN.
        if !(target.velocity > 0.) {
            return Err(MotionError::InvalidVelocity(target.velocity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingServo {
        commands: Mutex<Vec<ServoCommand>>,
        fail: bool,
    }

    impl ServoDevice for RecordingServo {
        fn command(&self, command: &ServoCommand) -> Result<(), String> {
            self.commands.lock().push(command.clone());
            match self.fail {
                true => Err("service call failed".to_string()),
                false => Ok(()),
            }
        }
    }

    fn travel() -> TravelRange {
        TravelRange::new(0.8, -1.0)
    }

    #[test]
    fn test_move_to_sends_command() {
        let controller = MotionController::new(RecordingServo::default(), "tilt", travel());
        controller.move_to(ServoTarget::new(0.25, 0.5)).unwrap();

        let commands = controller.servo.commands.lock();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].joint_name, "tilt");
        assert_eq!(commands[0].target, ServoTarget::new(0.25, 0.5));
    }

    #[test]
    fn test_move_to_device_failure() {
        let servo = RecordingServo {
            fail: true,
            ..Default::default()
        };
        let controller = MotionController::new(servo, "tilt", travel());
        let result = controller.move_to(ServoTarget::new(0.0, 1.0));
        assert!(matches!(
            result,
            Err(MotionError::ServoUnreachable { ref joint, .. }) if joint == "tilt"
        ));
        // single attempt, no retry
        assert_eq!(controller.servo.commands.lock().len(), 1);
    }

    #[test]
    fn test_move_to_rejects_invalid_target() {
        let controller = MotionController::new(RecordingServo::default(), "tilt", travel());

        assert!(matches!(
            controller.move_to(ServoTarget::new(1.2, 0.5)),
            Err(MotionError::OutOfRange { .. })
        ));
        assert!(matches!(
            controller.move_to(ServoTarget::new(0.0, 0.0)),
            Err(MotionError::InvalidVelocity(_))
        ));
        assert!(matches!(
            controller.move_to(ServoTarget::new(0.0, f64::NAN)),
            Err(MotionError::InvalidVelocity(_))
        ));
        assert!(controller.servo.commands.lock().is_empty());
    }
}
