//! HTTP GET into a byte sink.
//!
//! Each transfer issues one GET, checks the status, then streams body chunks
//! straight into the component's [`ByteSink`]. Two timeouts bound the
//! transfer: one until response headers arrive and one between body chunks.
//! Time the event loop spends blocked outside the transfers (installing a
//! finished component) is not charged against either of them.

use std::cell::Cell;
use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::Instant as TokioInstant;
use tracing::debug;

use super::session::TransferSession;
use crate::manager::config::InstallerConfig;
use crate::manager::error::{NetworkError, PipelineError, PipelineResult};
use crate::manager::sink::ByteSink;

/// Timeouts applied while a transfer is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timeouts {
    pub response: Duration,
    pub stall: Duration,
}

impl Timeouts {
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self {
            response: config.response_timeout,
            stall: config.stall_timeout,
        }
    }
}

/// Accumulated time the event loop was blocked by synchronous work.
#[derive(Debug, Default)]
pub(crate) struct LoopClock {
    blocked: Cell<Duration>,
}

impl LoopClock {
    /// Run `work` and add its wall time to the blocked total.
    pub fn blocking<T>(&self, work: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = work();
        self.blocked.set(self.blocked.get() + started.elapsed());
        result
    }

    pub fn blocked(&self) -> Duration {
        self.blocked.get()
    }
}

/// Await `future` for at most `limit` of unblocked loop time.
///
/// Returns `None` on timeout. When the deadline passes while the loop was
/// blocked, it is pushed back by the blocked time and the wait resumes.
pub(crate) async fn within<F: Future>(
    clock: &LoopClock,
    limit: Duration,
    future: F,
) -> Option<F::Output> {
    let mut future = pin!(future);
    let mut charged = clock.blocked();
    let mut deadline = TokioInstant::now() + limit;

    loop {
        match tokio::time::timeout_at(deadline, future.as_mut()).await {
            Ok(output) => return Some(output),
            Err(_) => {
                let blocked = clock.blocked();
                if blocked == charged {
                    return None;
                }
                deadline += blocked - charged;
                charged = blocked;
            }
        }
    }
}

/// Build the HTTP client shared by every transfer of a run.
///
/// Redirects are followed with reqwest's default policy.
pub(crate) fn build_client(config: &InstallerConfig) -> PipelineResult<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(concat!("stonectl/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PipelineError::Setup(format!("failed to create HTTP client: {}", e)))
}

/// Download `url` into `sink`, calling `on_chunk` after the headers and after
/// every received chunk.
pub(crate) async fn fetch<F>(
    client: &Client,
    url: &str,
    sink: &mut ByteSink,
    session: &mut TransferSession,
    timeouts: Timeouts,
    clock: &LoopClock,
    mut on_chunk: F,
) -> Result<(), NetworkError>
where
    F: FnMut(&TransferSession),
{
    let timed_out = |limit: Duration| NetworkError::Timeout {
        url: url.to_string(),
        timeout_ms: limit.as_millis() as u64,
    };
    let request_failed = |e: reqwest::Error| NetworkError::Request {
        url: url.to_string(),
        source: e,
    };

    let mut response = within(clock, timeouts.response, client.get(url).send())
        .await
        .ok_or_else(|| timed_out(timeouts.response))?
        .map_err(request_failed)?;

    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    session.set_expected_total(response.content_length());
    on_chunk(session);

    while let Some(chunk) = within(clock, timeouts.stall, response.chunk())
        .await
        .ok_or_else(|| timed_out(timeouts.stall))?
        .map_err(request_failed)?
    {
        sink.append(&chunk).map_err(NetworkError::Sink)?;
        session.record_chunk(chunk.len());
        on_chunk(session);
    }

    debug!(
        component = %session.component,
        bytes = session.bytes_received,
        elapsed_secs = session.elapsed_secs(),
        "Transfer body complete"
    );

    Ok(())
}
