use super::{Detector, DetectorSummary};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::{EvidenceReason, NewEvidence};
use crate::storage::Database;
use tracing::debug;

pub const EXACT_CONFIDENCE: f64 = 1.0;

/// Byte-identical items. The lowest id in each group is canonical.
pub fn detect(db: &Database, reporter: &dyn ProgressReporter) -> Result<DetectorSummary, Error> {
    let groups = db.content_digest_groups()?;
    let mut summary = DetectorSummary::new(Detector::Exact);
    reporter.on_stage_start("detect-exact", groups.len());

    for (i, (digest, ids)) in groups.iter().enumerate() {
        summary.examined += 1;
        // ids arrive ascending
        let Some((&canonical, rest)) = ids.split_first() else {
            summary.skipped += 1;
            continue;
        };
        debug!("Digest {} shared by {} items, canonical {}", digest, ids.len(), canonical);
        for &duplicate in rest {
            summary.record(
                db,
                &NewEvidence {
                    canonical_id: canonical,
                    duplicate_id: duplicate,
                    reason: EvidenceReason::ExactDigest,
                    confidence: EXACT_CONFIDENCE,
                },
            );
        }
        reporter.on_stage_progress(i + 1);
    }

    Ok(summary)
}
