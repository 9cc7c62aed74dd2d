//! Reporting sinks

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::traits::Reporter;

/// Emits every report line as a tracing event
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, message: &str) {
        info!(target: "rebalancer::report", "{message}");
    }
}

/// Forwards report lines into a bounded channel without waiting
///
/// A full or closed channel drops the line; reporting never stalls a cycle.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::Sender<String>,
}

impl ChannelReporter {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, message: &str) {
        if let Err(e) = self.sender.try_send(message.to_string()) {
            warn!(error = %e, "Dropping report line");
        }
    }
}

/// Keeps report lines in memory, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// True if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}
