//! stonectl - component installer for a sandboxed game server
//!
//! This library downloads the server's components over concurrent HTTP
//! transfers, unpacks them into a local installation tree and reports
//! progress while doing so. It also checks an existing installation and
//! builds the launch request for the process supervisor.

pub mod check;
pub mod component;
pub mod config;
pub mod launch;
pub mod logging;
pub mod manager;

use component::ComponentSpec;
use manager::{
    ComponentInstaller, InstallerConfig, PipelineResult, ProgressObserver, RunReport,
    SinkRegistry, TransferManager,
};

/// Download and install `specs` with a fresh sink registry.
///
/// Convenience wrapper for a one-shot install; hold a [`SinkRegistry`] and
/// call [`TransferManager::run`] directly to install more than once per
/// process.
pub fn install(
    specs: &[ComponentSpec],
    config: &InstallerConfig,
    observer: &dyn ProgressObserver,
) -> PipelineResult<RunReport> {
    let mut registry = SinkRegistry::new(config.reentry, config.spool_limit);
    let installer = ComponentInstaller::new(config);
    TransferManager::new(config)?.run(specs, &mut registry, &installer, observer)
}
