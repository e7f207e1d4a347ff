use std::sync::Arc;
use std::time::{Duration, Instant};

mod buffer;
mod constants;
mod error;
mod ingest_thread;
mod motion;
mod numeric;
mod plan;
mod sinks;
mod sweep;
mod sync;

pub use crate::buffer::{ScanBuffer, ScanPair};
pub use crate::error::{MotionError, SensorTimeout, SweepError, SweepPhase};
pub use crate::ingest_thread::{join, spawn_ingestion, IngestionThread};
pub use crate::motion::{MotionController, ServoDevice};
pub use crate::plan::{SweepPlan, SweepRequest};
pub use crate::sinks::{cloud_channel, scan_channel, ChannelCloudSink, ChannelScanSink, CloudSink};
pub use crate::sweep::{CloudAssembler, SweepController, SweepReport};
pub use crate::sync::{is_fresh_pair, PublishedPair, ScanSink, ScanSynchronizer};
use crossbeam_channel::Receiver;
use tiltscan_data::{ScanSample, SweepConfig};
use tracing::{info, warn};

/// Reply to a sweep request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResponse {
    /// True if the sweep completed and a cloud was published.
    pub finished: bool,
    /// Reason of the failure when `finished` is false.
    pub error: Option<String>,
}

/// Sweep request entry point.
///
/// Runs the configured sweep and publishes the assembled cloud.
pub struct TiltScanner<S, A, K, C> {
    controller: SweepController<S, A, K>,
    cloud_sink: C,
}

impl<S, A, K, C> TiltScanner<S, A, K, C>
where
    S: ServoDevice,
    A: CloudAssembler,
    K: ScanSink,
    C: CloudSink,
{
    pub fn new(controller: SweepController<S, A, K>, cloud_sink: C) -> Self {
        TiltScanner {
            controller,
            cloud_sink,
        }
    }

    pub fn controller(&self) -> &SweepController<S, A, K> {
        &self.controller
    }

    /// Runs one sweep. The cloud is published only if the whole sweep
    /// succeeded.
    pub fn scan(&self) -> Result<SweepReport, SweepError> {
        let report = self.controller.run_configured_sweep()?;
        self.cloud_sink.publish(&report.cloud);
        Ok(report)
    }

    /// Service-style wrapper around [`TiltScanner::scan`].
    pub fn handle_request(&self) -> ScanResponse {
        match self.scan() {
            Ok(_) => ScanResponse {
                finished: true,
                error: None,
            },
            Err(e) => ScanResponse {
                finished: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Blocks until the cloud assembler is available.
    pub fn wait_for_assembler(&self, timeout: Duration) -> Result<(), SweepError> {
        let start = Instant::now();
        info!("waiting for the cloud assembler");
        loop {
            if self.controller.assembler().is_available() {
                info!("cloud assembler found, ready to scan");
                return Ok(());
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                warn!(timeout_ms = timeout.as_millis() as u64, "cloud assembler not available");
                return Err(SweepError::AssemblyFailed {
                    reason: format!(
                        "assembler not available within {} ms",
                        timeout.as_millis()
                    ),
                });
            }
            std::thread::sleep(remaining.min(Duration::from_millis(100)));
        }
    }
}

/// Function to launch the tilt scanner.
/// # Arguments
///
/// * `feed_rx` - Scan lines of the 2-D laser scanner.
/// * `servo` - Servo device service tilting the scanner.
/// * `assembler` - Cloud assembly service.
/// * `scan_sink` - Receives two republished scan lines per sweep step.
/// * `cloud_sink` - Receives one cloud per successful sweep.
/// * `config` - Sweep parameters.
pub fn run_scanner<S, A, K, C>(
    feed_rx: Receiver<ScanSample>,
    servo: S,
    assembler: A,
    scan_sink: K,
    cloud_sink: C,
    config: SweepConfig,
) -> (IngestionThread, TiltScanner<S, A, K, C>)
where
    S: ServoDevice,
    A: CloudAssembler,
    K: ScanSink,
    C: CloudSink,
{
    let buffer = Arc::new(ScanBuffer::new());
    let ingestion = spawn_ingestion(feed_rx, buffer.clone());
    let controller = SweepController::new(servo, assembler, buffer, scan_sink, config);
    (ingestion, TiltScanner::new(controller, cloud_sink))
}
