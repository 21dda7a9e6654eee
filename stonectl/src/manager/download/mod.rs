//! Concurrent HTTP acquisition.
//!
//! ```text
//! TransferManager (transfer)
//!         │
//!         ├── reqwest::Client ── fetch (http) ──> ByteSink
//!         │
//!         ├── TransferSession (session, per transfer)
//!         │
//!         └── ComponentInstaller (on completion)
//! ```
//!
//! All transfers of a run share one single-threaded event loop; no more than
//! [`MAX_CONCURRENT_TRANSFERS`](crate::manager::MAX_CONCURRENT_TRANSFERS) are
//! ever in flight.

mod http;
mod session;
mod transfer;

pub use session::{TransferResult, TransferSession};
pub use transfer::{ComponentReport, RunReport, TransferManager};
