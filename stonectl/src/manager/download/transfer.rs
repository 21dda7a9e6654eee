//! Concurrent transfer manager.
//!
//! Drives every component's download on a single-threaded event loop, never
//! with more than [`InstallerConfig::concurrency`] transfers in flight. When a
//! transfer finishes its component is installed right away on the loop
//! thread, then the next pending component is started. Transfer timeouts are
//! paused while an install holds the loop.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use tracing::{debug, info, warn};

use super::http::{self, LoopClock, Timeouts};
use super::session::TransferSession;
use crate::component::ComponentSpec;
use crate::manager::config::InstallerConfig;
use crate::manager::error::{ComponentError, NetworkError, PipelineError, PipelineResult};
use crate::manager::installer::{ComponentInstaller, Outcome};
use crate::manager::progress::{ProgressBoard, ProgressObserver, Stage};
use crate::manager::sink::{ByteSink, SinkRegistry};

/// Result of one component in a run.
#[derive(Debug)]
pub struct ComponentReport {
    pub component: String,
    /// Payload bytes received.
    pub bytes_received: u64,
    pub outcome: Outcome,
}

/// Result of a whole run, in completion order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub components: Vec<ComponentReport>,
    /// Highest number of transfers that were in flight at once.
    pub peak_active: usize,
}

impl RunReport {
    /// Outcome of `component`, if it took part in the run.
    pub fn outcome(&self, component: &str) -> Option<&Outcome> {
        self.components
            .iter()
            .find(|r| r.component == component)
            .map(|r| &r.outcome)
    }

    pub fn installed_count(&self) -> usize {
        self.components
            .iter()
            .filter(|r| r.outcome.is_installed())
            .count()
    }

    /// Components that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ComponentError)> {
        self.components
            .iter()
            .filter_map(|r| r.outcome.error().map(|e| (r.component.as_str(), e)))
    }

    pub fn all_installed(&self) -> bool {
        self.components.iter().all(|r| r.outcome.is_installed())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} components installed",
            self.installed_count(),
            self.components.len()
        )
    }
}

/// A finished transfer handed back to the loop.
struct Finished<'a> {
    spec: &'a ComponentSpec,
    sink: ByteSink,
    session: TransferSession,
    result: Result<(), NetworkError>,
}

/// Runs bounded concurrent downloads and hands completed payloads to the
/// installer.
#[derive(Debug)]
pub struct TransferManager {
    client: Client,
    timeouts: Timeouts,
    ceiling: usize,
}

impl TransferManager {
    /// Create a manager with its HTTP client.
    pub fn new(config: &InstallerConfig) -> PipelineResult<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            timeouts: Timeouts::from_config(config),
            ceiling: config.concurrency(),
        })
    }

    /// Maximum transfers in flight.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Download and install every component in `specs`.
    ///
    /// Returns once every component has reached a terminal state. Duplicate
    /// names are collapsed to their first occurrence. Network, decode and
    /// extract failures are reported per component; a raw copy failure or a
    /// rejected re-acquisition aborts the run with an error.
    pub fn run(
        &self,
        specs: &[ComponentSpec],
        registry: &mut SinkRegistry,
        installer: &ComponentInstaller,
        observer: &dyn ProgressObserver,
    ) -> PipelineResult<RunReport> {
        let mut seen = HashSet::new();
        let mut unique: Vec<&ComponentSpec> = Vec::with_capacity(specs.len());
        for spec in specs {
            if seen.insert(spec.name.as_str()) {
                unique.push(spec);
            }
        }
        let specs = unique;

        for spec in &specs {
            registry.ensure_available(&spec.name)?;
        }

        if specs.is_empty() {
            return Ok(RunReport::default());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PipelineError::Setup(format!("failed to start event loop: {}", e)))?;

        info!(
            components = specs.len(),
            ceiling = self.ceiling,
            "Starting transfers"
        );
        let report = runtime.block_on(self.drive(&specs, registry, installer, observer))?;
        info!(
            installed = report.installed_count(),
            total = report.components.len(),
            peak_active = report.peak_active,
            "Transfers finished"
        );
        Ok(report)
    }

    async fn drive(
        &self,
        specs: &[&ComponentSpec],
        registry: &mut SinkRegistry,
        installer: &ComponentInstaller,
        observer: &dyn ProgressObserver,
    ) -> PipelineResult<RunReport> {
        let board = RefCell::new(ProgressBoard::new());
        let clock = LoopClock::default();
        let mut pending = specs.iter().copied();
        let mut in_flight = FuturesUnordered::new();
        let mut report = RunReport::default();

        loop {
            while in_flight.len() < self.ceiling {
                let Some(spec) = pending.next() else {
                    break;
                };
                let sink = registry.checkout(&spec.name)?;
                board.borrow_mut().enable(&spec.name);
                observer.on_stage(&spec.name, Stage::Downloading);
                debug!(component = %spec.name, url = %spec.url, "Transfer started");

                in_flight.push(self.transfer(spec, sink, &board, &clock, observer));
                report.peak_active = report.peak_active.max(in_flight.len());
            }

            let Some(finished) = in_flight.next().await else {
                break;
            };
            let Finished {
                spec,
                mut sink,
                session,
                result,
            } = finished;

            let outcome = clock.blocking(|| {
                let outcome = match result {
                    Ok(()) => {
                        debug!(
                            component = %spec.name,
                            bytes = sink.len(),
                            spilled = sink.is_spilled(),
                            "Transfer complete"
                        );
                        installer.install(spec, &mut sink, observer)?
                    }
                    Err(e) => {
                        warn!(component = %spec.name, error = %e, "Transfer failed");
                        Outcome::Failed(ComponentError::Network(e))
                    }
                };
                observer.on_outcome(&spec.name, &outcome);
                Ok::<_, PipelineError>(outcome)
            })?;

            board.borrow_mut().disable(&spec.name);
            observer.on_progress(&board.borrow());
            registry.checkin(sink);
            report.components.push(ComponentReport {
                component: spec.name.clone(),
                bytes_received: session.bytes_received,
                outcome,
            });
        }

        Ok(report)
    }

    async fn transfer<'a>(
        &'a self,
        spec: &'a ComponentSpec,
        mut sink: ByteSink,
        board: &'a RefCell<ProgressBoard>,
        clock: &'a LoopClock,
        observer: &'a dyn ProgressObserver,
    ) -> Finished<'a> {
        let mut session = TransferSession::new(spec.name.as_str());
        let result = http::fetch(
            &self.client,
            &spec.url,
            &mut sink,
            &mut session,
            self.timeouts,
            clock,
            |session| {
                board.borrow_mut().update(
                    &session.component,
                    session.bytes_received,
                    session.expected_total,
                );
                observer.on_progress(&board.borrow());
            },
        )
        .await;

        match result {
            Ok(()) => session.complete(),
            Err(_) => session.fail(),
        }

        Finished {
            spec,
            sink,
            session,
            result,
        }
    }
}
