//! State of one in-flight transfer.

use std::time::Instant;

/// Terminal state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    /// Still receiving.
    Pending,
    /// Body received completely.
    Completed,
    /// Aborted by a network error.
    Failed,
}

/// One HTTP transfer bound to exactly one component.
#[derive(Debug, Clone)]
pub struct TransferSession {
    /// Component the transfer belongs to.
    pub component: String,
    /// Bytes received so far.
    pub bytes_received: u64,
    /// Content length, once the response headers have arrived.
    pub expected_total: Option<u64>,
    pub result: TransferResult,
    started: Instant,
}

impl TransferSession {
    /// Create a session for a component.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            bytes_received: 0,
            expected_total: None,
            result: TransferResult::Pending,
            started: Instant::now(),
        }
    }

    /// Record response headers.
    pub fn set_expected_total(&mut self, total: Option<u64>) {
        self.expected_total = total;
    }

    /// Record a received body chunk.
    pub fn record_chunk(&mut self, len: usize) {
        self.bytes_received += len as u64;
    }

    /// Percentage received, 0.0 while the total is unknown.
    pub fn percent(&self) -> f64 {
        match self.expected_total {
            Some(total) if total > 0 => {
                (self.bytes_received as f64 / total as f64 * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    pub fn complete(&mut self) {
        self.result = TransferResult::Completed;
    }

    pub fn fail(&mut self) {
        self.result = TransferResult::Failed;
    }

    pub fn is_finished(&self) -> bool {
        self.result != TransferResult::Pending
    }

    /// Seconds since the session was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
