use crate::buffer::{ScanBuffer, ScanPair};
use crate::error::SensorTimeout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiltscan_data::ScanSample;
use tracing::{debug, warn};

/// Downstream consumer of republished scan lines.
pub trait ScanSink: Send + Sync {
    fn publish(&self, sample: &ScanSample);
}

impl<T: ScanSink + ?Sized> ScanSink for Box<T> {
    fn publish(&self, sample: &ScanSample) {
        (**self).publish(sample)
    }
}

impl<T: ScanSink + ?Sized> ScanSink for Arc<T> {
    fn publish(&self, sample: &ScanSample) {
        (**self).publish(sample)
    }
}

/// Sequence ids republished for one settled servo position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishedPair {
    /// Line captured before the settle point.
    pub previous: u64,
    /// Line captured at or after the settle point.
    pub latest: u64,
}

/// Returns true if both slots hold lines strictly newer than `marker`.
///
/// A pair whose slots carry the same id has not advanced twice yet and is
/// never ready.
pub fn is_fresh_pair(pair: &ScanPair, marker: Option<u64>) -> bool {
    let (Some(previous), Some(latest)) = pair.seqs() else {
        return false;
    };
    if previous == latest {
        return false;
    }
    match marker {
        None => true,
        Some(marker) => previous > marker && latest > marker,
    }
}

fn take_fresh(pair: ScanPair, marker: Option<u64>) -> Option<(ScanSample, ScanSample)> {
    if !is_fresh_pair(&pair, marker) {
        return None;
    }
    Some((pair.previous?, pair.latest?))
}

/// Publishes exactly one fresh scan pair per settled servo position.
///
/// The publish marker is the id of the last line handed to the sink. It only
/// moves forward, so no line is published twice.
pub struct ScanSynchronizer<K> {
    buffer: Arc<ScanBuffer>,
    sink: K,
    marker: Option<u64>,
    poll_interval: Duration,
}

impl<K: ScanSink> ScanSynchronizer<K> {
    pub fn new(buffer: Arc<ScanBuffer>, sink: K, poll_interval: Duration) -> Self {
        ScanSynchronizer {
            buffer,
            sink,
            marker: None,
            poll_interval,
        }
    }

    /// Synchronizer that treats every line up to `seq` as already published.
    pub fn resume_from(
        buffer: Arc<ScanBuffer>,
        sink: K,
        poll_interval: Duration,
        seq: u64,
    ) -> Self {
        let mut synchronizer = ScanSynchronizer::new(buffer, sink, poll_interval);
        synchronizer.marker = Some(seq);
        synchronizer
    }

    pub fn published_marker(&self) -> Option<u64> {
        self.marker
    }

    /// Non-blocking variant of [`Self::await_and_publish`].
    ///
    /// Publishes and returns the pair if it is ready now, `None` otherwise.
    pub fn try_publish(&mut self) -> Option<PublishedPair> {
        let (previous, latest) = take_fresh(self.buffer.pair(), self.marker)?;
        Some(self.publish(previous, latest))
    }

    /// Waits for a fresh pair, publishes `previous` then `latest` and moves
    /// the marker to `latest`.
    ///
    /// Nothing is published on timeout and the marker is left untouched.
    pub fn await_and_publish(&mut self, timeout: Duration) -> Result<PublishedPair, SensorTimeout> {
        let start = Instant::now();
        let marker = self.marker;
        let ready = self
            .buffer
            .wait_until(start + timeout, self.poll_interval, |pair| {
                is_fresh_pair(pair, marker)
            });

        match ready.and_then(|pair| take_fresh(pair, marker)) {
            Some((previous, latest)) => Ok(self.publish(previous, latest)),
            None => {
                let waited = start.elapsed();
                warn!(?marker, waited_ms = waited.as_millis() as u64, "no fresh scan pair");
                Err(SensorTimeout { waited, marker })
            }
        }
    }

    fn publish(&mut self, previous: ScanSample, latest: ScanSample) -> PublishedPair {
        self.sink.publish(&previous);
        self.sink.publish(&latest);
        self.marker = Some(latest.seq);
        debug!(previous = previous.seq, latest = latest.seq, "published scan pair");
        PublishedPair {
            previous: previous.seq,
            latest: latest.seq,
        }
    }
}
