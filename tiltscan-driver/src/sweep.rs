use crate::buffer::ScanBuffer;
use crate::error::{SweepError, SweepPhase};
use crate::motion::{MotionController, ServoDevice};
use crate::numeric::radian_to_degree;
use crate::plan::{SweepPlan, SweepRequest};
use crate::sync::{ScanSink, ScanSynchronizer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tiltscan_data::{PointCloud, ServoTarget, SweepConfig, SweepWindow};
use tracing::{debug, error, info, warn};

/// Cloud assembly service.
///
/// Assembles every scan line republished within `window` into one cloud.
pub trait CloudAssembler: Send + Sync {
    fn assemble(&self, window: SweepWindow) -> Result<PointCloud, String>;

    /// Whether the service accepts requests.
    fn is_available(&self) -> bool {
        true
    }
}

impl<T: CloudAssembler + ?Sized> CloudAssembler for Box<T> {
    fn assemble(&self, window: SweepWindow) -> Result<PointCloud, String> {
        (**self).assemble(window)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<T: CloudAssembler + ?Sized> CloudAssembler for Arc<T> {
    fn assemble(&self, window: SweepWindow) -> Result<PointCloud, String> {
        (**self).assemble(window)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Result of a completed sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepReport {
    pub cloud: PointCloud,
    pub window: SweepWindow,
    /// Servo steps that were reached and settled.
    pub steps_completed: usize,
    /// Scan lines handed to the scan sink. Always twice `steps_completed`.
    pub scans_published: usize,
    /// Sequence id of the first line published in this sweep.
    pub first_seq: Option<u64>,
    /// Sequence id of the last line published in this sweep.
    pub last_seq: Option<u64>,
}

#[derive(Default)]
struct Progress {
    steps_completed: usize,
    scans_published: usize,
    first_seq: Option<u64>,
    last_seq: Option<u64>,
}

/// Drives the servo through a sweep and collects one fresh scan pair per
/// position.
///
/// Only one sweep runs at a time. A request that arrives while a sweep holds
/// the synchronizer fails with [`SweepError::Busy`].
pub struct SweepController<S, A, K> {
    motion: MotionController<S>,
    assembler: A,
    synchronizer: Mutex<ScanSynchronizer<K>>,
    config: SweepConfig,
}

impl<S, A, K> SweepController<S, A, K>
where
    S: ServoDevice,
    A: CloudAssembler,
    K: ScanSink,
{
    pub fn new(
        servo: S,
        assembler: A,
        buffer: Arc<ScanBuffer>,
        scan_sink: K,
        config: SweepConfig,
    ) -> Self {
        let motion = MotionController::new(servo, config.joint_name.clone(), config.travel);
        let synchronizer = ScanSynchronizer::new(buffer, scan_sink, config.poll_interval());
        SweepController {
            motion,
            assembler,
            synchronizer: Mutex::new(synchronizer),
            config,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    pub fn is_busy(&self) -> bool {
        self.synchronizer.is_locked()
    }

    /// Sequence id of the last republished line. Blocks while a sweep runs.
    pub fn published_marker(&self) -> Option<u64> {
        self.synchronizer.lock().published_marker()
    }

    /// Runs the sweep described by the configuration.
    pub fn run_configured_sweep(&self) -> Result<SweepReport, SweepError> {
        self.run_sweep(&SweepRequest::from_config(&self.config))
    }

    /// Runs one full sweep: start position, every plan step, assembly and
    /// parking.
    ///
    /// If any servo move was commanded and the sweep then fails, the servo is
    /// sent to `standby` on a best-effort basis before the error is returned.
    pub fn run_sweep(&self, request: &SweepRequest) -> Result<SweepReport, SweepError> {
        let Some(mut synchronizer) = self.synchronizer.try_lock() else {
            warn!("sweep request rejected, another sweep is in progress");
            return Err(SweepError::Busy);
        };
        request.validate(self.motion.travel())?;

        info!(
            steps = request.steps,
            from_deg = radian_to_degree(request.from),
            to_deg = radian_to_degree(request.to),
            "starting sweep"
        );
        let mut progress = Progress::default();
        let result = self.execute(&mut synchronizer, request, &mut progress);

        match &result {
            Ok(report) => info!(
                steps = report.steps_completed,
                points = report.cloud.len(),
                "sweep finished"
            ),
            Err(SweepError::Motion {
                phase: SweepPhase::Park,
                ..
            }) => error!("sweep failed while parking"),
            Err(e) => {
                error!(steps = progress.steps_completed, "sweep aborted: {e}");
                self.park_best_effort(request.standby);
            }
        }
        result
    }

    fn execute(
        &self,
        synchronizer: &mut ScanSynchronizer<K>,
        request: &SweepRequest,
        progress: &mut Progress,
    ) -> Result<SweepReport, SweepError> {
        self.move_to(
            SweepPhase::Start,
            ServoTarget::new(request.from, self.config.start_velocity),
            progress,
        )?;

        let begin = SystemTime::now();
        let plan = SweepPlan::linear(
            request.from,
            request.to,
            request.steps,
            self.config.step_velocity,
        );
        for (index, target) in plan.iter().enumerate() {
            debug!(index, angle_deg = radian_to_degree(target.angle), "sweep step");
            self.move_to(SweepPhase::Step { index }, *target, progress)?;

            let published = synchronizer
                .await_and_publish(self.config.settle_timeout())
                .map_err(|source| SweepError::SensorTimeout {
                    step: index,
                    steps_completed: progress.steps_completed,
                    source,
                })?;

            progress.first_seq.get_or_insert(published.previous);
            progress.last_seq = Some(published.latest);
            progress.scans_published += 2;
            progress.steps_completed += 1;
        }
        let window = SweepWindow {
            begin,
            end: SystemTime::now(),
        };

        let cloud = self
            .assembler
            .assemble(window)
            .map_err(|reason| {
                error!(%reason, "failed to assemble scans");
                SweepError::AssemblyFailed { reason }
            })?;
        info!(points = cloud.len(), "scan assembled");

        self.move_to(
            SweepPhase::Park,
            ServoTarget::new(request.standby, self.config.park_velocity),
            progress,
        )?;

        Ok(SweepReport {
            cloud,
            window,
            steps_completed: progress.steps_completed,
            scans_published: progress.scans_published,
            first_seq: progress.first_seq,
            last_seq: progress.last_seq,
        })
    }

    fn move_to(
        &self,
        phase: SweepPhase,
        target: ServoTarget,
        progress: &Progress,
    ) -> Result<(), SweepError> {
        self.motion
            .move_to(target)
            .map_err(|source| SweepError::Motion {
                phase,
                steps_completed: progress.steps_completed,
                source,
            })
    }

    fn park_best_effort(&self, standby: f64) {
        let target = ServoTarget::new(standby, self.config.park_velocity);
        match self.motion.move_to(target) {
            Ok(()) => info!("servo parked after failed sweep"),
            Err(e) => warn!("could not park servo after failed sweep: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MotionError;
    use std::time::Duration;
    use tiltscan_data::{LaserScan, ScanSample, ServoCommand, TravelRange};

    /// Servo whose every move makes the sensor deliver two new lines.
    struct FeedingServo {
        buffer: Arc<ScanBuffer>,
        next_seq: Mutex<u64>,
        commands: Mutex<Vec<ServoCommand>>,
        fail_on_call: Option<usize>,
    }

    impl FeedingServo {
        fn new(buffer: Arc<ScanBuffer>, fail_on_call: Option<usize>) -> Self {
            FeedingServo {
                buffer,
                next_seq: Mutex::new(1),
                commands: Mutex::new(Vec::new()),
                fail_on_call,
            }
        }
    }

    impl ServoDevice for FeedingServo {
        fn command(&self, command: &ServoCommand) -> Result<(), String> {
            let mut commands = self.commands.lock();
            commands.push(command.clone());
            if self.fail_on_call == Some(commands.len()) {
                return Err("servo_node unavailable".to_string());
            }
            let mut seq = self.next_seq.lock();
            for _ in 0..2 {
                self.buffer
                    .push(ScanSample::new(*seq, SystemTime::now(), LaserScan::default()));
                *seq += 1;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingAssembler {
        calls: Mutex<Vec<SweepWindow>>,
        fail: bool,
    }

    impl CloudAssembler for CountingAssembler {
        fn assemble(&self, window: SweepWindow) -> Result<PointCloud, String> {
            self.calls.lock().push(window);
            match self.fail {
                true => Err("assemble_scans2 unavailable".to_string()),
                false => Ok(PointCloud {
                    stamp: window.end,
                    points: Vec::new(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct SeqSink {
        seqs: Mutex<Vec<u64>>,
    }

    impl ScanSink for SeqSink {
        fn publish(&self, sample: &ScanSample) {
            self.seqs.lock().push(sample.seq);
        }
    }

    fn config(steps: usize) -> SweepConfig {
        SweepConfig {
            steps,
            settle_timeout_ms: 50,
            poll_rate_hz: 500.,
            ..SweepConfig::default()
        }
    }

    type TestController = SweepController<Arc<FeedingServo>, Arc<CountingAssembler>, Arc<SeqSink>>;

    fn controller(
        steps: usize,
        fail_on_call: Option<usize>,
        assembler: CountingAssembler,
    ) -> (TestController, Arc<FeedingServo>, Arc<CountingAssembler>, Arc<SeqSink>) {
        let buffer = Arc::new(ScanBuffer::new());
        let servo = Arc::new(FeedingServo::new(buffer.clone(), fail_on_call));
        let assembler = Arc::new(assembler);
        let sink = Arc::new(SeqSink::default());
        let controller = SweepController::new(
            servo.clone(),
            assembler.clone(),
            buffer,
            sink.clone(),
            config(steps),
        );
        (controller, servo, assembler, sink)
    }

    #[test]
    fn test_successful_sweep() {
        let (controller, servo, assembler, sink) = controller(10, None, Default::default());
        let report = controller.run_configured_sweep().unwrap();

        assert_eq!(report.steps_completed, 10);
        assert_eq!(report.scans_published, 20);
        assert_eq!(sink.seqs.lock().len(), 20);
        assert!(sink.seqs.lock().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.first_seq, Some(3));
        assert_eq!(report.last_seq, Some(22));
        assert_eq!(controller.published_marker(), Some(22));

        // start + 10 steps + park
        let commands = servo.commands.lock();
        assert_eq!(commands.len(), 12);
        let config = controller.config();
        assert_eq!(commands[0].target.angle, config.start_angle);
        assert_eq!(commands[0].target.velocity, 1.5);
        assert_eq!(commands[1].target.angle, config.start_angle);
        assert_eq!(commands[1].target.velocity, 0.5);
        assert_eq!(commands[11].target.angle, config.standby_angle);
        assert_eq!(commands[11].target.velocity, 1.0);

        assert_eq!(assembler.calls.lock().len(), 1);
        assert_eq!(assembler.calls.lock()[0], report.window);
    }

    #[test]
    fn test_motion_failure_aborts_sweep() {
        // call 1 is the start move, so call 4 is step index 2
        let (controller, servo, assembler, sink) = controller(10, Some(4), Default::default());
        let err = controller.run_configured_sweep().unwrap_err();

        assert!(matches!(
            err,
            SweepError::Motion {
                phase: SweepPhase::Step { index: 2 },
                steps_completed: 2,
                source: MotionError::ServoUnreachable { .. },
            }
        ));
        assert!(assembler.calls.lock().is_empty());
        assert_eq!(sink.seqs.lock().len(), 4);

        // best-effort park after the failing step
        let commands = servo.commands.lock();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[4].target.angle, controller.config().standby_angle);
    }

    #[test]
    fn test_assembly_failure_aborts_sweep() {
        let assembler = CountingAssembler {
            fail: true,
            ..Default::default()
        };
        let (controller, servo, assembler, _sink) = controller(3, None, assembler);
        let err = controller.run_configured_sweep().unwrap_err();

        assert!(matches!(err, SweepError::AssemblyFailed { .. }));
        assert_eq!(assembler.calls.lock().len(), 1);
        // start + 3 steps + best-effort park
        assert_eq!(servo.commands.lock().len(), 5);
    }

    #[test]
    fn test_park_failure_is_reported() {
        // start + 2 steps, then the park move fails
        let (controller, servo, _assembler, _sink) = controller(2, Some(4), Default::default());
        let err = controller.run_configured_sweep().unwrap_err();

        assert!(matches!(
            err,
            SweepError::Motion {
                phase: SweepPhase::Park,
                steps_completed: 2,
                ..
            }
        ));
        // no second park attempt
        assert_eq!(servo.commands.lock().len(), 4);
    }

    #[test]
    fn test_sensor_timeout_aborts_sweep() {
        // The feed delivered two lines once and then went silent.
        let buffer = Arc::new(ScanBuffer::new());
        for seq in 1..=2 {
            buffer.push(ScanSample::new(seq, SystemTime::now(), LaserScan::default()));
        }
        let assembler = Arc::new(CountingAssembler::default());
        let sink = Arc::new(SeqSink::default());
        let controller =
            SweepController::new(SilentServo, assembler.clone(), buffer, sink.clone(), config(5));

        let err = controller.run_configured_sweep().unwrap_err();
        match err {
            SweepError::SensorTimeout {
                step,
                steps_completed,
                source,
            } => {
                assert_eq!(step, 1);
                assert_eq!(steps_completed, 1);
                assert_eq!(source.marker, Some(2));
                assert!(source.waited >= Duration::from_millis(50));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*sink.seqs.lock(), vec![1, 2]);
        assert!(assembler.calls.lock().is_empty());
    }

    struct SilentServo;

    impl ServoDevice for SilentServo {
        fn command(&self, _command: &ServoCommand) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn test_invalid_request_does_not_move() {
        let (controller, servo, _assembler, _sink) = controller(3, None, Default::default());
        let err = controller
            .run_sweep(&SweepRequest {
                from: 3.0,
                to: 0.0,
                standby: 0.0,
                steps: 3,
            })
            .unwrap_err();
        assert!(matches!(err, SweepError::InvalidPlan(_)));
        assert!(servo.commands.lock().is_empty());
    }

    #[test]
    fn test_busy_while_sweeping() {
        let (controller, servo, _assembler, _sink) = controller(3, None, Default::default());
        let guard = controller.synchronizer.lock();
        assert!(controller.is_busy());
        assert!(matches!(
            controller.run_configured_sweep(),
            Err(SweepError::Busy)
        ));
        drop(guard);
        assert!(servo.commands.lock().is_empty());
        assert!(controller.run_configured_sweep().is_ok());
    }

    #[test]
    fn test_travel_range_is_enforced_per_request() {
        let (controller, _servo, _assembler, _sink) = controller(3, None, Default::default());
        let travel: TravelRange = controller.config().travel;
        let request = SweepRequest {
            from: travel.upper,
            to: travel.lower,
            standby: travel.lower - 0.1,
            steps: 3,
        };
        assert!(matches!(
            controller.run_sweep(&request),
            Err(SweepError::InvalidPlan(_))
        ));
    }
}
