//! Per-component installation.
//!
//! Once a component's payload is fully buffered, the installer turns it into
//! files under the installation root:
//!
//! - Raw payloads are copied to `<root>/<name>` and marked executable. A
//!   failure here is returned as [`PipelineError::RawCopy`] and ends the run.
//! - Archive payloads are gunzipped into a temporary store, then unpacked into
//!   `<root>/<name>/`. Failures are captured in [`Outcome::Failed`] so sibling
//!   components keep installing.
//! - The sandbox-root component additionally gets its mount-point directories.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::config::InstallerConfig;
use super::error::{ComponentError, DecodeError, ExtractError, PipelineError, PipelineResult};
use super::extractor::ArchiveExtractor;
use super::inflate::Inflater;
use super::progress::{ProgressObserver, Stage};
use super::sink::ByteSink;
use crate::component::{ComponentSpec, PayloadKind, SANDBOX_MOUNT_POINTS};

/// Details of a successful installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSummary {
    /// File or directory that was written.
    pub path: PathBuf,
    /// Bytes written (raw) or decoded (archive).
    pub bytes: u64,
    /// Archive entries extracted; 0 for raw payloads.
    pub entries: usize,
}

/// Terminal state of one component.
#[derive(Debug)]
pub enum Outcome {
    Installed(InstallSummary),
    Failed(ComponentError),
}

impl Outcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, Outcome::Installed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&ComponentError> {
        match self {
            Outcome::Installed(_) => None,
            Outcome::Failed(e) => Some(e),
        }
    }
}

/// Installs buffered payloads into the installation root.
#[derive(Debug)]
pub struct ComponentInstaller {
    root: PathBuf,
    inflater: Inflater,
    extractor: ArchiveExtractor,
    spool_limit: usize,
}

impl ComponentInstaller {
    /// Create an installer from the pipeline configuration.
    pub fn new(config: &InstallerConfig) -> Self {
        Self {
            root: config.root.clone(),
            inflater: Inflater::new(config.chunk_size),
            extractor: ArchiveExtractor::new(),
            spool_limit: config.spool_limit,
        }
    }

    /// Installation root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Install one component from its sink.
    ///
    /// Archive failures come back as `Ok(Outcome::Failed(_))`; only a raw copy
    /// failure is an `Err`.
    pub fn install(
        &self,
        spec: &ComponentSpec,
        sink: &mut ByteSink,
        observer: &dyn ProgressObserver,
    ) -> PipelineResult<Outcome> {
        match spec.kind {
            PayloadKind::Raw => {
                let summary = self.install_raw(spec, sink, observer)?;
                info!(
                    component = %spec.name,
                    bytes = summary.bytes,
                    path = %summary.path.display(),
                    "Component installed"
                );
                Ok(Outcome::Installed(summary))
            }
            PayloadKind::Archive => match self.install_archive(spec, sink, observer) {
                Ok(summary) => {
                    info!(
                        component = %spec.name,
                        entries = summary.entries,
                        bytes = summary.bytes,
                        "Component installed"
                    );
                    Ok(Outcome::Installed(summary))
                }
                Err(e) => {
                    warn!(component = %spec.name, error = %e, "Component failed");
                    Ok(Outcome::Failed(e))
                }
            },
        }
    }

    fn install_raw(
        &self,
        spec: &ComponentSpec,
        sink: &mut ByteSink,
        observer: &dyn ProgressObserver,
    ) -> PipelineResult<InstallSummary> {
        let path = spec.destination(&self.root);
        let fail = |e: io::Error| PipelineError::RawCopy {
            component: spec.name.clone(),
            path: path.clone(),
            source: e,
        };

        observer.on_stage(&spec.name, Stage::Writing { bytes: sink.len() });

        fs::create_dir_all(&self.root).map_err(fail)?;
        sink.rewind().map_err(fail)?;

        let mut file = open_executable(&path).map_err(fail)?;
        let bytes = io::copy(sink, &mut file).map_err(fail)?;
        file.flush().map_err(fail)?;
        mark_executable(&path).map_err(fail)?;

        Ok(InstallSummary {
            path,
            bytes,
            entries: 0,
        })
    }

    fn install_archive(
        &self,
        spec: &ComponentSpec,
        sink: &mut ByteSink,
        observer: &dyn ProgressObserver,
    ) -> Result<InstallSummary, ComponentError> {
        let dest = spec.destination(&self.root);
        observer.on_stage(&spec.name, Stage::Extracting);

        fs::create_dir_all(&dest).map_err(|e| ExtractError::Io {
            path: dest.clone(),
            source: e,
        })?;

        sink.rewind().map_err(DecodeError::from)?;
        let mut decoded = tempfile::spooled_tempfile(self.spool_limit);
        let bytes = self
            .inflater
            .decode(|buf| sink.read(buf), |data| decoded.write_all(data))?;
        decoded
            .seek(SeekFrom::Start(0))
            .map_err(DecodeError::from)?;

        let summary = self
            .extractor
            .extract_with(&mut decoded, &dest, |path| observer.on_entry(&spec.name, path))?;

        if spec.sandbox_root {
            observer.on_stage(&spec.name, Stage::PostProcessing);
            create_mount_points(&dest)?;
        }

        Ok(InstallSummary {
            path: dest,
            bytes,
            entries: summary.entries,
        })
    }
}

/// Create the empty directories the supervisor bind-mounts into the sandbox.
fn create_mount_points(root: &Path) -> Result<(), ExtractError> {
    for name in SANDBOX_MOUNT_POINTS {
        let dir = root.join(name);
        fs::create_dir_all(&dir).map_err(|e| ExtractError::Io {
            path: dir.clone(),
            source: e,
        })?;
    }
    Ok(())
}

fn open_executable(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }
    options.open(path)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
