use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tiltscan_data::ScanSample;

/// The two most recent scan samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPair {
    pub previous: Option<ScanSample>,
    pub latest: Option<ScanSample>,
}

impl ScanPair {
    /// Sequence ids of `(previous, latest)`.
    pub fn seqs(&self) -> (Option<u64>, Option<u64>) {
        (
            self.previous.as_ref().map(|s| s.seq),
            self.latest.as_ref().map(|s| s.seq),
        )
    }

    fn shift_in(&mut self, sample: ScanSample) {
        self.previous = self.latest.take();
        self.latest = Some(sample);
    }
}

struct Slots {
    pair: ScanPair,
    received: u64,
}

/// Double-slot buffer shared between the ingestion thread and the sweep.
///
/// Both slots are swapped under one lock, so readers always see a
/// consistent `(previous, latest)` pair. Every push wakes waiters.
pub struct ScanBuffer {
    slots: Mutex<Slots>,
    arrived: Condvar,
}

impl ScanBuffer {
    pub fn new() -> ScanBuffer {
        ScanBuffer {
            slots: Mutex::new(Slots {
                pair: ScanPair::default(),
                received: 0,
            }),
            arrived: Condvar::new(),
        }
    }

    /// Stores `sample` as the latest one. The former latest becomes previous.
    pub fn push(&self, sample: ScanSample) {
        let mut slots = self.slots.lock();
        slots.pair.shift_in(sample);
        slots.received += 1;
        drop(slots);
        self.arrived.notify_all();
    }

    pub fn latest(&self) -> Option<ScanSample> {
        self.slots.lock().pair.latest.clone()
    }

    pub fn previous(&self) -> Option<ScanSample> {
        self.slots.lock().pair.previous.clone()
    }

    /// Snapshot of both slots taken atomically.
    pub fn pair(&self) -> ScanPair {
        self.slots.lock().pair.clone()
    }

    /// Total number of samples pushed since creation.
    pub fn received(&self) -> u64 {
        self.slots.lock().received
    }

    /// Blocks until `ready` accepts the current pair or `deadline` passes.
    ///
    /// The predicate is re-evaluated after every push and at least once per
    /// `slice`. Returns the accepted pair, or `None` on timeout.
    pub(crate) fn wait_until<F>(
        &self,
        deadline: Instant,
        slice: Duration,
        mut ready: F,
    ) -> Option<ScanPair>
    where
        F: FnMut(&ScanPair) -> bool,
    {
        let mut slots: MutexGuard<'_, Slots> = self.slots.lock();
        loop {
            if ready(&slots.pair) {
                return Some(slots.pair.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let wake_at = deadline.min(now + slice);
            // Spurious and slice wakeups fall through to the predicate.
            let _ = self.arrived.wait_until(&mut slots, wake_at);
        }
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        ScanBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::SystemTime;
    use tiltscan_data::LaserScan;

    fn sample(seq: u64) -> ScanSample {
        ScanSample::new(seq, SystemTime::now(), LaserScan::default())
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = ScanBuffer::new();
        assert!(buffer.latest().is_none());
        assert!(buffer.previous().is_none());
        assert_eq!(buffer.pair().seqs(), (None, None));
        assert_eq!(buffer.received(), 0);
    }

    #[test]
    fn test_push_shifts_slots() {
        let buffer = ScanBuffer::new();
        buffer.push(sample(1));
        assert_eq!(buffer.pair().seqs(), (None, Some(1)));

        buffer.push(sample(2));
        assert_eq!(buffer.pair().seqs(), (Some(1), Some(2)));
        assert_eq!(buffer.latest().unwrap().seq, 2);
        assert_eq!(buffer.previous().unwrap().seq, 1);

        buffer.push(sample(3));
        assert_eq!(buffer.pair().seqs(), (Some(2), Some(3)));
        assert_eq!(buffer.received(), 3);
    }

    #[test]
    fn test_wait_until_times_out() {
        let buffer = ScanBuffer::new();
        let start = Instant::now();
        let pair = buffer.wait_until(
            start + Duration::from_millis(30),
            Duration::from_millis(5),
            |p| p.latest.is_some(),
        );
        assert!(pair.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_until_wakes_on_push() {
        let buffer = Arc::new(ScanBuffer::new());
        let producer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for seq in 1..=3 {
                    std::thread::sleep(Duration::from_millis(5));
                    buffer.push(sample(seq));
                }
            })
        };

        let pair = buffer
            .wait_until(
                Instant::now() + Duration::from_secs(5),
                Duration::from_secs(1),
                |p| p.seqs() == (Some(2), Some(3)),
            )
            .unwrap();
        assert_eq!(pair.seqs(), (Some(2), Some(3)));
        producer.join().unwrap();
    }
}
