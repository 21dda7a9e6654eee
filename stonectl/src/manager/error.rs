//! Error types for the acquisition pipeline.
//!
//! Errors fall into two groups. [`ComponentError`] is scoped to one component:
//! it ends up in that component's [`Outcome`](super::Outcome) and the run
//! continues. [`PipelineError`] aborts the whole run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure reasons of the streaming gzip decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The source ran dry before the gzip end marker.
    #[error("compressed stream is truncated")]
    Truncated,

    /// The stream requires a preset dictionary.
    #[error("compressed stream needs an external dictionary")]
    NeedsExternalDictionary,

    /// Reading the source or writing the output failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The decoder was driven in an inconsistent state.
    #[error("stream state error")]
    Protocol,

    /// Invalid deflate data or gzip framing.
    #[error("compressed stream is corrupt")]
    CorruptData,

    #[error("memory allocation failed")]
    OutOfMemory,

    /// The decoder could make no progress with the buffers it was given.
    #[error("compressed stream is truncated or otherwise corrupt")]
    BufferUnderrun,

    #[error("compressed stream version mismatched")]
    VersionMismatch,

    /// Decoder status with no other mapping. flate2 surfaces none.
    #[error("unknown decoder error")]
    Unknown,
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::Io(e.to_string())
    }
}

/// Failures while unpacking a tar stream.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Header could not be read or parsed.
    #[error("malformed archive: {0}")]
    Malformed(io::Error),

    /// Entry path escapes the destination root.
    #[error("unsafe entry path {}", .path.display())]
    UnsafePath { path: PathBuf },

    /// Filesystem operation failed while writing an entry.
    #[error("failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Transfer-level failures reported by the HTTP layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("{url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Received bytes could not be stored.
    #[error("failed to buffer payload: {0}")]
    Sink(io::Error),
}

/// Failures of the sink registry.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The component was already acquired and the registry rejects re-entry.
    #[error("{0} was already acquired in this process")]
    AlreadyAcquired(String),

    #[error("sink I/O error for {name}: {source}")]
    Io { name: String, source: io::Error },
}

/// A failure confined to one component.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("failed to download: {0}")]
    Network(#[from] NetworkError),

    #[error("failed to inflate: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to extract: {0}")]
    Extract(#[from] ExtractError),
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Copying a raw payload failed. Never isolated per component.
    #[error("failed to install {component} to {}: {source}", .path.display())]
    RawCopy {
        component: String,
        path: PathBuf,
        source: io::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// HTTP client or runtime could not be set up.
    #[error("failed to initialize transfers: {0}")]
    Setup(String),
}
