//! Channel type definitions for handing report lines to a notification task

use tokio::sync::mpsc;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Create a new report channel with the default buffer size
pub fn create_report_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new report channel with a custom buffer size
pub fn create_report_channel_with_size(
    size: usize,
) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(size)
}
