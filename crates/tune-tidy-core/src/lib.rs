pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod execute;
pub mod identity;
pub mod plan;
pub mod progress;
pub mod resolve;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use detect::{Detector, DetectorSummary};
pub use engine::{IngestEngine, IngestSummary};
pub use error::Error;
pub use execute::{ExecFailure, ExecutionReport, ExecutionSummary, ExecutorOptions, Outcome};
pub use plan::{PlanOptions, PlanSummary};
pub use progress::{ProgressReporter, SilentReporter};
pub use resolve::ResolveSummary;
pub use storage::Database;
