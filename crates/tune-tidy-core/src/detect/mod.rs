//! Duplicate detectors. Each pass reads items and appends evidence edges; none of them
//! touches item status.

pub mod exact;
pub mod fingerprint;
pub mod metadata;

use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::NewEvidence;
use crate::storage::Database;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    Exact,
    Fingerprint,
    Metadata,
}

impl Detector {
    /// Order matters: metadata candidates exclude items already covered by the first two.
    pub const ALL: [Detector; 3] = [Detector::Exact, Detector::Fingerprint, Detector::Metadata];
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Detector::Exact => "exact",
            Detector::Fingerprint => "fingerprint",
            Detector::Metadata => "metadata",
        })
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSummary {
    pub detector: Detector,
    /// Groups (exact, fingerprint) or candidate pairs (metadata) examined.
    pub examined: usize,
    pub new_edges: usize,
    /// Groups or pairs skipped, either by rule or because a write failed.
    pub skipped: usize,
}

impl DetectorSummary {
    fn new(detector: Detector) -> Self {
        Self {
            detector,
            examined: 0,
            new_edges: 0,
            skipped: 0,
        }
    }

    /// Insert one edge, counting it. Write failures are logged and counted as skipped.
    fn record(&mut self, db: &Database, evidence: &NewEvidence) {
        match db.insert_evidence(evidence) {
            Ok(true) => self.new_edges += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    "Could not record {} evidence {} -> {}: {}",
                    evidence.reason, evidence.canonical_id, evidence.duplicate_id, e
                );
                self.skipped += 1;
            }
        }
    }
}

pub fn run_detector(
    db: &Database,
    detector: Detector,
    reporter: &dyn ProgressReporter,
) -> Result<DetectorSummary, Error> {
    let stage = format!("detect-{}", detector);
    let start = Instant::now();
    let summary = match detector {
        Detector::Exact => exact::detect(db, reporter)?,
        Detector::Fingerprint => fingerprint::detect(db, reporter)?,
        Detector::Metadata => metadata::detect(db, reporter)?,
    };
    reporter.on_stage_complete(&stage, start.elapsed().as_secs_f64());
    info!(
        "{} detector: {} examined, {} new edges, {} skipped",
        detector, summary.examined, summary.new_edges, summary.skipped
    );
    Ok(summary)
}

pub fn run_all(db: &Database, reporter: &dyn ProgressReporter) -> Result<Vec<DetectorSummary>, Error> {
    Detector::ALL
        .iter()
        .map(|d| run_detector(db, *d, reporter))
        .collect()
}
