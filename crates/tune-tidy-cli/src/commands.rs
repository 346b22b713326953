use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tune_tidy_core::Detector;

#[derive(Debug, Parser)]
#[command(name = "tune-tidy")]
#[command(about = "Find duplicate tracks and tidy a music library, one reversible step at a time", long_about = None)]
pub struct Cli {
    /// Store path, overriding `store_path` from configuration
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DetectorArg {
    Exact,
    Fingerprint,
    Metadata,
    All,
}

impl DetectorArg {
    pub fn detectors(self) -> Vec<Detector> {
        match self {
            DetectorArg::Exact => vec![Detector::Exact],
            DetectorArg::Fingerprint => vec![Detector::Fingerprint],
            DetectorArg::Metadata => vec![Detector::Metadata],
            DetectorArg::All => Detector::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover audio files under the configured source roots and record them
    Ingest,
    /// Gather duplicate evidence
    Detect {
        #[arg(value_enum, default_value_t = DetectorArg::All)]
        detector: DetectorArg,
    },
    /// Annotate items with their strongest evidence
    Resolve,
    /// Queue archive intents for high-confidence duplicates
    Plan {
        #[arg(long)]
        dry_run: bool,
    },
    /// Queue migrate intents moving new items into the library layout
    PlanMigrations {
        #[arg(long)]
        dry_run: bool,
    },
    /// Queue soft-removal of empty or artwork-only directories below DIR
    PlanCleanup {
        dir: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply pending intents to the filesystem
    Execute {
        #[arg(long)]
        dry_run: bool,
        /// Process at most this many intents
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ingest, detect, resolve and plan in one go
    Process {
        #[arg(long)]
        dry_run: bool,
    },
    /// Move an errored intent back to pending
    Retry { intent_id: i64 },
    /// List errored intents with their detail
    Errors,
    /// Print item, evidence and intent counts
    Summary,
    /// Write all intents to a CSV file
    ExportIntents { path: PathBuf },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
