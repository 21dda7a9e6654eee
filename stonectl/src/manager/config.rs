//! Configuration for the acquisition pipeline.

use std::path::PathBuf;
use std::time::Duration;

use super::inflate::DEFAULT_CHUNK_SIZE;
use super::sink::{ReentryPolicy, DEFAULT_SPOOL_LIMIT};
use crate::component::DEFAULT_ROOT;

/// Hard ceiling on simultaneous transfers.
pub const MAX_CONCURRENT_TRANSFERS: usize = 10;

/// Configuration for the installer pipeline.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Installation root. Archive components extract into subdirectories,
    /// raw components are written as files.
    pub root: PathBuf,

    /// Maximum number of transfers in flight, clamped to
    /// `1..=MAX_CONCURRENT_TRANSFERS`.
    pub max_concurrent_transfers: usize,

    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,

    /// Time allowed between sending a request and receiving response headers.
    pub response_timeout: Duration,

    /// Time allowed between two body chunks.
    pub stall_timeout: Duration,

    /// Working chunk of the gzip decoder.
    pub chunk_size: usize,

    /// Payload bytes kept in memory before a sink spills to disk.
    pub spool_limit: usize,

    /// What a second acquisition of the same component does.
    pub reentry: ReentryPolicy,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            max_concurrent_transfers: MAX_CONCURRENT_TRANSFERS,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
            stall_timeout: Duration::from_secs(30),
            chunk_size: DEFAULT_CHUNK_SIZE,
            spool_limit: DEFAULT_SPOOL_LIMIT,
            reentry: ReentryPolicy::Reset,
        }
    }
}

impl InstallerConfig {
    /// Create a configuration with the given installation root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set the maximum concurrent transfers.
    pub fn with_max_concurrent_transfers(mut self, max: usize) -> Self {
        self.max_concurrent_transfers = max.clamp(1, MAX_CONCURRENT_TRANSFERS);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the response header timeout.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the body stall timeout.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the decoder chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the sink spool threshold.
    pub fn with_spool_limit(mut self, bytes: usize) -> Self {
        self.spool_limit = bytes;
        self
    }

    /// Set the re-entry policy.
    pub fn with_reentry(mut self, policy: ReentryPolicy) -> Self {
        self.reentry = policy;
        self
    }

    /// Effective transfer ceiling.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_transfers
            .clamp(1, MAX_CONCURRENT_TRANSFERS)
    }
}
