//! Per-component download buffers.
//!
//! A [`ByteSink`] accumulates one component's payload in memory, spilling to
//! an anonymous temporary file once it grows past the spool threshold. The
//! [`SinkRegistry`] owns one sink per component identity for its whole
//! lifetime and decides what happens when a component is acquired twice.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;
use tracing::debug;

use super::error::SinkError;

/// Default in-memory threshold before a sink spills to disk (64 MiB).
pub const DEFAULT_SPOOL_LIMIT: usize = 64 * 1024 * 1024;

/// What to do when a component is acquired again from the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentryPolicy {
    /// Truncate the existing sink and download again.
    #[default]
    Reset,
    /// Refuse the second acquisition.
    Reject,
}

impl ReentryPolicy {
    /// Parse from a config string.
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reset" => Some(ReentryPolicy::Reset),
            "reject" => Some(ReentryPolicy::Reject),
            _ => None,
        }
    }
}

/// Growable, seekable byte store for one component's payload.
#[derive(Debug)]
pub struct ByteSink {
    name: String,
    store: SpooledTempFile,
    len: u64,
}

impl ByteSink {
    /// Create an empty sink that keeps up to `spool_limit` bytes in memory.
    pub fn new(name: impl Into<String>, spool_limit: usize) -> Self {
        Self {
            name: name.into(),
            store: tempfile::spooled_tempfile(spool_limit),
            len: 0,
        }
    }

    /// Component this sink belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bytes appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the payload has spilled out of memory.
    pub fn is_spilled(&self) -> bool {
        self.store.is_rolled()
    }

    /// Append bytes at the end of the sink.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.store.seek(SeekFrom::End(0))?;
        self.store.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Position the read cursor at the first byte.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.store.flush()?;
        self.store.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Drop all content, keeping the sink itself.
    pub fn reset(&mut self) -> io::Result<()> {
        self.store.set_len(0)?;
        self.store.seek(SeekFrom::Start(0))?;
        self.len = 0;
        Ok(())
    }
}

impl Read for ByteSink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.store.read(buf)
    }
}

/// Owns the sink of every component acquired through it.
///
/// Sinks are checked out for the duration of a transfer and returned once the
/// component has been installed, so the registry is the single owner between
/// runs.
#[derive(Debug)]
pub struct SinkRegistry {
    policy: ReentryPolicy,
    spool_limit: usize,
    sinks: HashMap<String, ByteSink>,
    acquired: HashSet<String>,
}

impl SinkRegistry {
    /// Create an empty registry.
    pub fn new(policy: ReentryPolicy, spool_limit: usize) -> Self {
        Self {
            policy,
            spool_limit,
            sinks: HashMap::new(),
            acquired: HashSet::new(),
        }
    }

    pub fn policy(&self) -> ReentryPolicy {
        self.policy
    }

    /// Whether `name` has been acquired at least once.
    pub fn was_acquired(&self, name: &str) -> bool {
        self.acquired.contains(name)
    }

    /// Fail if `name` cannot be acquired under the registry's policy.
    pub fn ensure_available(&self, name: &str) -> Result<(), SinkError> {
        if self.policy == ReentryPolicy::Reject && self.acquired.contains(name) {
            return Err(SinkError::AlreadyAcquired(name.to_string()));
        }
        Ok(())
    }

    /// Take the sink for `name` out of the registry, ready for writing.
    ///
    /// A previously used sink is reset under [`ReentryPolicy::Reset`].
    pub fn checkout(&mut self, name: &str) -> Result<ByteSink, SinkError> {
        self.ensure_available(name)?;

        let sink = match self.sinks.remove(name) {
            Some(mut sink) => {
                debug!(component = name, previous_len = sink.len(), "Resetting sink");
                sink.reset().map_err(|e| SinkError::Io {
                    name: name.to_string(),
                    source: e,
                })?;
                sink
            }
            None => ByteSink::new(name, self.spool_limit),
        };

        self.acquired.insert(name.to_string());
        Ok(sink)
    }

    /// Return a sink after its component has been processed.
    pub fn checkin(&mut self, sink: ByteSink) {
        self.sinks.insert(sink.name.clone(), sink);
    }

    /// Look at a returned sink.
    pub fn get(&self, name: &str) -> Option<&ByteSink> {
        self.sinks.get(name)
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new(ReentryPolicy::default(), DEFAULT_SPOOL_LIMIT)
    }
}
