// Queue sizes of the republishing channels.
pub(crate) const SCAN_QUEUE_SIZE: usize = 100;
pub(crate) const CLOUD_QUEUE_SIZE: usize = 1;
pub(crate) const TERMINATOR_QUEUE_SIZE: usize = 10;
