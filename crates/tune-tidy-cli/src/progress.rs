use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tune_tidy_core::ProgressReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Discover phase: spinner (unknown total upfront)
/// - Extract phase and later stages: bar with a known length
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(TICK_CHARS);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn bar(label: &str, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let template = format!(
        "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
        label
    );
    let style = ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars(TICK_CHARS);
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

fn done(message: String) {
    eprintln!("  {} {}", "✓".green(), message);
}

impl ProgressReporter for CliReporter {
    fn on_discover_start(&self) {
        self.set_bar(spinner("Discovering audio files..."));
    }

    fn on_discover_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        done(format!(
            "Discovery complete: {} files in {:.2}s",
            total_files, duration_secs
        ));
    }

    fn on_extract_start(&self, total_files: usize) {
        self.set_bar(bar("Extracting", total_files));
    }

    fn on_extract_progress(&self, files_done: usize, _total_files: usize) {
        self.with_bar(|pb| pb.set_position(files_done as u64));
    }

    fn on_extract_complete(&self, duration_secs: f64) {
        self.finish_bar();
        done(format!("Extraction complete in {:.2}s", duration_secs));
    }

    fn on_stage_start(&self, stage: &str, total: usize) {
        self.set_bar(bar(stage, total));
    }

    fn on_stage_progress(&self, position: usize) {
        self.with_bar(|pb| pb.set_position(position as u64));
    }

    fn on_stage_complete(&self, stage: &str, duration_secs: f64) {
        self.finish_bar();
        done(format!("{} complete in {:.2}s", stage, duration_secs));
    }
}
