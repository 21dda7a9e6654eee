//! Per-component progress bars.
//!
//! When stderr is not a terminal the bars stay hidden and the board's
//! plain-text status line is printed instead, at most once per interval.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use console::{style, Term};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use stonectl::manager::{Outcome, ProgressBoard, ProgressObserver, Stage};

const BAR_TEMPLATE: &str = "{prefix} {bar:30.cyan/blue} {wide_msg}";
const SPINNER_TEMPLATE: &str = "{prefix} {spinner:.green} {wide_msg:.dim}";

/// Minimum gap between plain status lines.
const PLAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Throttled status lines for non-interactive output.
#[derive(Debug, Default)]
struct PlainStatus {
    last_line: String,
    last_printed: Option<Instant>,
}

impl PlainStatus {
    /// The line to print for `board` at `now`, if any.
    fn next_line(&mut self, board: &ProgressBoard, now: Instant) -> Option<String> {
        let line = board.render();
        if line.is_empty() || line == self.last_line {
            return None;
        }
        if let Some(at) = self.last_printed {
            if now.duration_since(at) < PLAIN_INTERVAL {
                return None;
            }
        }
        self.last_printed = Some(now);
        self.last_line = line.clone();
        Some(line)
    }
}

/// Renders pipeline notifications as one line per component.
pub struct TerminalObserver {
    multi: MultiProgress,
    bars: RefCell<HashMap<String, ProgressBar>>,
    plain: Option<RefCell<PlainStatus>>,
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalObserver {
    pub fn new() -> Self {
        let plain = if Term::stderr().is_term() {
            None
        } else {
            Some(RefCell::new(PlainStatus::default()))
        };
        Self {
            multi: MultiProgress::new(),
            bars: RefCell::new(HashMap::new()),
            plain,
        }
    }

    /// Remove all bars from the terminal.
    pub fn clear(&self) {
        for bar in self.bars.borrow().values() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }

    fn bar(&self, component: &str) -> ProgressBar {
        self.bars
            .borrow_mut()
            .entry(component.to_string())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(bar_style());
                bar.set_prefix(format!("[{:<5}]", component));
                bar
            })
            .clone()
    }
}

impl ProgressObserver for TerminalObserver {
    fn on_progress(&self, board: &ProgressBoard) {
        if let Some(plain) = &self.plain {
            if let Some(line) = plain.borrow_mut().next_line(board, Instant::now()) {
                eprintln!("{}", line);
            }
            return;
        }
        for (component, percent) in board.active() {
            let bar = self.bar(component);
            bar.set_position(percent as u64);
            bar.set_message(download_message(percent));
        }
    }

    fn on_stage(&self, component: &str, stage: Stage) {
        let bar = self.bar(component);
        match stage {
            Stage::Downloading => {
                bar.set_style(bar_style());
                bar.set_position(0);
                bar.set_message(download_message(0.0));
            }
            Stage::Writing { bytes } => {
                bar.set_style(spinner_style());
                bar.set_message(format!("writing {}", format_size(bytes)));
            }
            Stage::Extracting => {
                bar.set_style(spinner_style());
                bar.set_message("extracting");
            }
            Stage::PostProcessing => bar.set_message("preparing sandbox"),
        }
        bar.tick();
    }

    fn on_entry(&self, component: &str, path: &Path) {
        self.bar(component).set_message(path.display().to_string());
    }

    fn on_outcome(&self, component: &str, outcome: &Outcome) {
        let bar = self.bar(component);
        bar.set_style(spinner_style());
        match outcome {
            Outcome::Installed(_) => {
                bar.finish_with_message(style("installed").green().to_string())
            }
            Outcome::Failed(e) => bar.finish_with_message(style(e.to_string()).red().to_string()),
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Download status, e.g. `⇩ 42.0%`.
pub fn download_message(percent: f64) -> String {
    format!("⇩{:5.1}%", percent)
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
