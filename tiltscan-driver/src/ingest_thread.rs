use crate::buffer::ScanBuffer;
use crate::constants::TERMINATOR_QUEUE_SIZE;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tiltscan_data::ScanSample;
use tracing::{debug, warn};

/// Background thread that moves scan samples from the sensor feed into the
/// scan buffer.
pub struct IngestionThread {
    pub(crate) terminator_tx: Sender<bool>,
    pub(crate) thread: Option<JoinHandle<()>>,
}

/// Starts draining `feed_rx` into `buffer`.
pub fn spawn_ingestion(feed_rx: Receiver<ScanSample>, buffer: Arc<ScanBuffer>) -> IngestionThread {
    let (terminator_tx, terminator_rx) = bounded(TERMINATOR_QUEUE_SIZE);
    let thread = Some(std::thread::spawn(move || {
        ingest_samples(feed_rx, terminator_rx, &buffer);
    }));
    IngestionThread {
        terminator_tx,
        thread,
    }
}

pub(crate) fn ingest_samples(
    feed_rx: Receiver<ScanSample>,
    terminator_rx: Receiver<bool>,
    buffer: &ScanBuffer,
) {
    loop {
        select! {
            recv(terminator_rx) -> _ => return,
            recv(feed_rx) -> sample => match sample {
                Ok(sample) => {
                    debug!(seq = sample.seq, "scan received");
                    buffer.push(sample);
                }
                Err(_) => {
                    warn!("scan feed disconnected, stopping ingestion");
                    return;
                }
            },
        }
    }
}

impl IngestionThread {
    /// Returns true if the thread has stopped, e.g. because the feed closed.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Function to join the ingestion thread.
/// This function is automatically called when `ingestion_thread` is dropped.
pub fn join(ingestion_thread: &mut IngestionThread) {
    // The thread may already have stopped on its own.
    let _ = ingestion_thread.terminator_tx.try_send(true);

    if let Some(thread) = ingestion_thread.thread.take() {
        if thread.join().is_err() {
            warn!("ingestion thread panicked");
        }
    }
}

impl Drop for IngestionThread {
    fn drop(&mut self) {
        join(self);
    }
}
