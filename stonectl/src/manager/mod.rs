//! Component acquisition pipeline.
//!
//! Downloads components concurrently into in-memory (spill-to-disk) sinks,
//! then installs each one as soon as its transfer completes:
//!
//! - `sink`: per-component byte stores and the registry that owns them
//! - `inflate`: chunked gzip decoding over pull/push callbacks
//! - `extractor`: streaming tar extraction with overwrite semantics
//! - `installer`: raw copy or decode + extract, plus sandbox fixups
//! - `download`: bounded concurrent HTTP transfers
//! - `progress`: progress board and observer hooks
//!
//! # Example
//!
//! ```ignore
//! use stonectl::component::Component;
//! use stonectl::manager::{
//!     ComponentInstaller, InstallerConfig, NoopObserver, SinkRegistry, TransferManager,
//! };
//!
//! let config = InstallerConfig::new(".stone");
//! let specs: Vec<_> = Component::ALL.iter().map(|c| c.spec()).collect();
//! let mut registry = SinkRegistry::new(config.reentry, config.spool_limit);
//!
//! let report = TransferManager::new(&config)?.run(
//!     &specs,
//!     &mut registry,
//!     &ComponentInstaller::new(&config),
//!     &NoopObserver,
//! )?;
//! println!("{}", report);
//! ```

mod config;
mod download;
mod error;
mod extractor;
mod inflate;
mod installer;
mod progress;
mod sink;

pub use config::{InstallerConfig, MAX_CONCURRENT_TRANSFERS};
pub use download::{ComponentReport, RunReport, TransferManager, TransferResult, TransferSession};
pub use error::{
    ComponentError, DecodeError, ExtractError, NetworkError, PipelineError, PipelineResult,
    SinkError,
};
pub use extractor::{ArchiveExtractor, ExtractSummary};
pub use inflate::{Inflater, DEFAULT_CHUNK_SIZE};
pub use installer::{ComponentInstaller, InstallSummary, Outcome};
pub use progress::{NoopObserver, ProgressBoard, ProgressEntry, ProgressObserver, Stage};
pub use sink::{ByteSink, ReentryPolicy, SinkRegistry, DEFAULT_SPOOL_LIMIT};
