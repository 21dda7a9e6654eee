//! Live progress state and the observer seam.
//!
//! The transfer loop writes download percentages into a [`ProgressBoard`] and
//! notifies a [`ProgressObserver`]. Rendering is left to the observer so the
//! pipeline can run without a terminal.

use std::fmt::Write as _;
use std::path::Path;

use super::installer::Outcome;

/// Progress of one component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressEntry {
    /// Whether the component is currently downloading.
    pub enabled: bool,
    /// Download percentage, 0.0 until the total size is known.
    pub percent: f64,
}

/// Per-component progress, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProgressBoard {
    entries: Vec<(String, ProgressEntry)>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, name: &str) -> &mut ProgressEntry {
        let index = match self.entries.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.entries
                    .push((name.to_string(), ProgressEntry::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Start showing `name` at 0%.
    pub fn enable(&mut self, name: &str) {
        *self.slot(name) = ProgressEntry {
            enabled: true,
            percent: 0.0,
        };
    }

    /// Record `downloaded` of `total` bytes. An unknown or zero total leaves
    /// the percentage untouched.
    pub fn update(&mut self, name: &str, downloaded: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|t| *t > 0) {
            let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0);
            self.slot(name).percent = percent;
        }
    }

    /// Stop showing `name`.
    pub fn disable(&mut self, name: &str) {
        self.slot(name).enabled = false;
    }

    pub fn get(&self, name: &str) -> Option<ProgressEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| *e)
    }

    /// Components currently downloading.
    pub fn active(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(n, e)| (n.as_str(), e.percent))
    }

    /// One status line covering every active component.
    pub fn render(&self) -> String {
        let mut line = String::new();
        for (name, percent) in self.active() {
            let _ = write!(line, "[{:<5}]⇩{:5.1}%", name, percent);
        }
        line
    }
}

/// Pipeline stages reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Transfer registered.
    Downloading,
    /// Raw payload being copied to its destination.
    Writing { bytes: u64 },
    /// Archive being decoded and unpacked.
    Extracting,
    /// Post-extraction fixups.
    PostProcessing,
}

/// Receives pipeline notifications. All methods default to no-ops.
pub trait ProgressObserver {
    /// Download percentages changed.
    fn on_progress(&self, _board: &ProgressBoard) {}

    /// A component entered a new stage.
    fn on_stage(&self, _component: &str, _stage: Stage) {}

    /// An archive entry is about to be written.
    fn on_entry(&self, _component: &str, _path: &Path) {}

    /// A component reached its terminal state.
    fn on_outcome(&self, _component: &str, _outcome: &Outcome) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}
