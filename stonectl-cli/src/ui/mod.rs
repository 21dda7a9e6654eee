//! Terminal output for the installer.

mod progress;

pub use progress::{format_size, TerminalObserver};
