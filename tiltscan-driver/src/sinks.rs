use crate::constants::{CLOUD_QUEUE_SIZE, SCAN_QUEUE_SIZE};
use crate::sync::ScanSink;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use tiltscan_data::{PointCloud, ScanSample};
use tracing::{debug, warn};

/// Downstream consumer of assembled clouds.
pub trait CloudSink: Send + Sync {
    fn publish(&self, cloud: &PointCloud);
}

impl<T: CloudSink + ?Sized> CloudSink for Box<T> {
    fn publish(&self, cloud: &PointCloud) {
        (**self).publish(cloud)
    }
}

impl<T: CloudSink + ?Sized> CloudSink for Arc<T> {
    fn publish(&self, cloud: &PointCloud) {
        (**self).publish(cloud)
    }
}

/// Scan sink backed by a bounded channel.
///
/// A full queue blocks the sweep until the consumer catches up, so every
/// counted line reaches the receiver. A closed receiver is logged and
/// otherwise ignored.
pub struct ChannelScanSink {
    tx: Sender<ScanSample>,
}

impl ChannelScanSink {
    pub fn new(tx: Sender<ScanSample>) -> Self {
        ChannelScanSink { tx }
    }
}

impl ScanSink for ChannelScanSink {
    fn publish(&self, sample: &ScanSample) {
        if self.tx.send(sample.clone()).is_err() {
            warn!(sink = "cleaned_scan", seq = sample.seq, "no receiver");
        }
    }
}

/// Cloud sink backed by a bounded channel that keeps the newest clouds.
///
/// When the queue is full the oldest queued cloud is evicted to make room.
pub struct ChannelCloudSink {
    tx: Sender<PointCloud>,
    evict_rx: Receiver<PointCloud>,
}

impl ChannelCloudSink {
    pub fn new(tx: Sender<PointCloud>, evict_rx: Receiver<PointCloud>) -> Self {
        ChannelCloudSink { tx, evict_rx }
    }
}

impl CloudSink for ChannelCloudSink {
    fn publish(&self, cloud: &PointCloud) {
        let mut cloud = cloud.clone();
        // The consumer may drain the queue between the two calls.
        for _ in 0..2 {
            match self.tx.try_send(cloud) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if self.evict_rx.try_recv().is_ok() {
                        debug!(sink = "assembled_cloud", "evicted stale cloud");
                    }
                    cloud = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!(sink = "assembled_cloud", "no receiver");
                    return;
                }
            }
        }
        warn!(sink = "assembled_cloud", "queue full, dropping cloud");
    }
}

/// Channel sink for republished scan lines and its receiving end.
pub fn scan_channel() -> (ChannelScanSink, Receiver<ScanSample>) {
    let (tx, rx) = bounded(SCAN_QUEUE_SIZE);
    (ChannelScanSink::new(tx), rx)
}

/// Channel sink for assembled clouds and its receiving end.
pub fn cloud_channel() -> (ChannelCloudSink, Receiver<PointCloud>) {
    let (tx, rx) = bounded(CLOUD_QUEUE_SIZE);
    (ChannelCloudSink::new(tx, rx.clone()), rx)
}
