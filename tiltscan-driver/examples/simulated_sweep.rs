use clap::Parser;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tiltscan_data::{
    LaserScan, Point3, PointCloud, ScanSample, ServoCommand, SweepConfig, SweepWindow,
};
use tiltscan_driver::{cloud_channel, run_scanner, CloudAssembler, ScanSink, ServoDevice};

/// Runs one sweep against a simulated servo and laser scanner.
#[derive(Parser, Debug)]
#[command(about = "Sweeps a simulated tilting laser scanner and assembles a point cloud.")]
struct Args {
    /// TOML file with sweep parameters. Missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the number of sweep steps.
    #[arg(long)]
    steps: Option<usize>,
    /// Line rate of the simulated laser scanner.
    #[arg(long, default_value_t = 200.)]
    scan_rate_hz: f64,
    /// Writes the assembled cloud as JSON to this file.
    #[arg(long)]
    json: Option<PathBuf>,
}

/// Servo that moves instantly and remembers where it is.
struct SimulatedServo {
    angle: Arc<Mutex<f64>>,
}

impl ServoDevice for SimulatedServo {
    fn command(&self, command: &ServoCommand) -> Result<(), String> {
        let mut angle = self.angle.lock();
        let travel = (command.target.angle - *angle).abs();
        std::thread::sleep(Duration::from_secs_f64(travel / command.target.velocity / 50.));
        *angle = command.target.angle;
        Ok(())
    }
}

/// Republished line together with the tilt at which it was published.
struct TiltedLine {
    published: SystemTime,
    tilt: f64,
    scan: LaserScan,
}

/// Records republished lines so the assembler can turn them into points.
struct LineRecorder {
    tilt: Arc<Mutex<f64>>,
    lines: Arc<Mutex<Vec<TiltedLine>>>,
}

impl ScanSink for LineRecorder {
    fn publish(&self, sample: &ScanSample) {
        self.lines.lock().push(TiltedLine {
            published: SystemTime::now(),
            tilt: *self.tilt.lock(),
            scan: sample.scan.clone(),
        });
    }
}

struct TiltAssembler {
    lines: Arc<Mutex<Vec<TiltedLine>>>,
}

impl CloudAssembler for TiltAssembler {
    fn assemble(&self, window: SweepWindow) -> Result<PointCloud, String> {
        let lines = self.lines.lock();
        let points = lines
            .iter()
            .filter(|line| window.contains(line.published))
            .flat_map(|line| {
                let (sin_t, cos_t) = (line.tilt as f32).sin_cos();
                line.scan.ranges.iter().enumerate().map(move |(i, r)| {
                    let beam = line.scan.angle_min + i as f32 * line.scan.angle_increment;
                    let (x, y) = (r * beam.cos(), r * beam.sin());
                    Point3 {
                        x: x * cos_t,
                        y,
                        z: -x * sin_t,
                        intensity: 0.,
                    }
                })
            })
            .collect();
        Ok(PointCloud {
            stamp: window.end,
            points,
        })
    }
}

fn start_sensor(feed_tx: Sender<ScanSample>, rate_hz: f64, stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let period = Duration::from_secs_f64(1. / rate_hz);
        let mut seq = 0;
        while !stop.load(Ordering::Relaxed) {
            let n = 181;
            let scan = LaserScan {
                angle_min: -std::f32::consts::FRAC_PI_2,
                angle_max: std::f32::consts::FRAC_PI_2,
                angle_increment: std::f32::consts::PI / (n - 1) as f32,
                range_min: 0.05,
                range_max: 30.,
                ranges: vec![3.0; n],
                intensities: Vec::new(),
            };
            if feed_tx.send(ScanSample::new(seq, SystemTime::now(), scan)).is_err() {
                return;
            }
            seq += 1;
            std::thread::sleep(period);
        }
    });
}

fn load_config(args: &Args) -> Result<SweepConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => SweepConfig {
            steps: 100,
            ..SweepConfig::default()
        },
    };
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiltscan_driver=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let tilt = Arc::new(Mutex::new(config.standby_angle));
    let lines = Arc::new(Mutex::new(Vec::new()));
    let servo = SimulatedServo { angle: tilt.clone() };
    let recorder = LineRecorder {
        tilt,
        lines: lines.clone(),
    };
    let assembler = TiltAssembler { lines };
    let (cloud_sink, cloud_rx) = cloud_channel();

    let stop = Arc::new(AtomicBool::new(false));
    let (feed_tx, feed_rx) = crossbeam_channel::bounded(100);
    start_sensor(feed_tx, args.scan_rate_hz, stop.clone());

    let (ingestion, scanner) = run_scanner(feed_rx, servo, assembler, recorder, cloud_sink, config);
    scanner.wait_for_assembler(Duration::from_secs(1))?;

    let report = scanner.scan()?;
    println!(
        "Sweep finished: {} steps, {} lines (#{} to #{}), {} points in {:.2} s.",
        report.steps_completed,
        report.scans_published,
        report.first_seq.unwrap_or_default(),
        report.last_seq.unwrap_or_default(),
        report.cloud.len(),
        report.window.duration().as_secs_f64(),
    );

    if let (Some(path), Ok(cloud)) = (&args.json, cloud_rx.try_recv()) {
        std::fs::write(path, serde_json::to_vec(&cloud)?)?;
        println!("Cloud written to {}.", path.display());
    }

    stop.store(true, Ordering::Relaxed);
    drop(ingestion);
    Ok(())
}
