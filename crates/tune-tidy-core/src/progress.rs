/// Trait for reporting stage progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_discover_start(&self) {}
    fn on_discover_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_extract_start(&self, _total_files: usize) {}
    fn on_extract_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_extract_complete(&self, _duration_secs: f64) {}
    fn on_stage_start(&self, _stage: &str, _total: usize) {}
    fn on_stage_progress(&self, _done: usize) {}
    fn on_stage_complete(&self, _stage: &str, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
