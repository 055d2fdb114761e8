//! Console reporting for deploy runs

use crate::device::PlatformVersion;
use crate::engine::{SyncEvent, SyncReport, TreeSide};
use crate::types::SyncAction;
use console::{style, StyledObject};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

/// Reporting sink for sync events
///
/// Prints one line per action before it runs and shows a spinner while a
/// tree is being scanned. In JSON mode nothing is printed here; the caller
/// prints the final report instead.
pub struct Reporter {
    json: bool,
    spinner: RefCell<Option<ProgressBar>>,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            spinner: RefCell::new(None),
        }
    }

    /// Handle one event from the engine.
    pub fn handle(&self, event: &SyncEvent) {
        if self.json {
            return;
        }
        match event {
            SyncEvent::ScanStarted { side } => self.start_scan(*side),
            SyncEvent::ScanProgress { side, files } => self.update_scan(*side, *files),
            SyncEvent::ScanFinished { .. } => self.finish_scan(),
            SyncEvent::Action(action) => println!("{}", styled_action(action)),
        }
    }

    /// "Found device ..." banner
    pub fn device_banner(&self, destination: &Path, platform: &PlatformVersion) {
        if !self.json {
            println!("{}\n", format_device_banner(destination, platform));
        }
    }

    /// "From: / To:" header
    pub fn paths(&self, source: &Path, destination: &Path) {
        if !self.json {
            println!("From: {}", source.display());
            println!("  To: {}\n", destination.display());
        }
    }

    /// Closing summary line
    pub fn summary(&self, report: &SyncReport) {
        if !self.json {
            println!("\n{}", style(format_summary(report)).bold());
        }
    }

    fn start_scan(&self, side: TreeSide) {
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(120));
        if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        spinner.set_message(format!("Scanning {}...", side));
        *self.spinner.borrow_mut() = Some(spinner);
    }

    fn update_scan(&self, side: TreeSide, files: u64) {
        if let Some(spinner) = self.spinner.borrow().as_ref() {
            spinner.set_message(format!("Scanning {}... {} matching file(s)", side, files));
        }
    }

    fn finish_scan(&self) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
    }
}

fn styled_action(action: &SyncAction) -> StyledObject<String> {
    match action {
        SyncAction::Copy { .. } => style(action.to_string()).green(),
        SyncAction::Delete { .. } => style(action.to_string()).red(),
    }
}

pub fn format_device_banner(destination: &Path, platform: &PlatformVersion) -> String {
    format!(
        "Found device ({}) at {}, running CircuitPython {}",
        platform.board_id.as_deref().unwrap_or("unknown board"),
        destination.display(),
        platform.version
    )
}

pub fn format_summary(report: &SyncReport) -> String {
    let copies = report.copy_count();
    let deletes = report.delete_count();
    if report.dry_run {
        format!(
            "Dry run: would copy {} file(s) ({}) and delete {} file(s). No changes were made.",
            copies,
            HumanBytes(report.planned_bytes()),
            deletes
        )
    } else {
        format!(
            "Copied {} file(s) ({}), deleted {} file(s).",
            copies,
            HumanBytes(report.bytes_copied),
            deletes
        )
    }
}
