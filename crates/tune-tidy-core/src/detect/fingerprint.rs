use super::{Detector, DetectorSummary};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::{EvidenceReason, NewEvidence};
use crate::storage::Database;
use std::cmp::Reverse;

pub const FINGERPRINT_CONFIDENCE: f64 = 0.85;

/// Highest declared bitrate wins (missing counts as 0), then lowest id.
pub fn pick_canonical(members: &[(i64, Option<i64>)]) -> Option<i64> {
    members
        .iter()
        .max_by_key(|(id, bitrate)| (bitrate.unwrap_or(0), Reverse(*id)))
        .map(|(id, _)| *id)
}

/// Items sharing a perceptual digest.
pub fn detect(db: &Database, reporter: &dyn ProgressReporter) -> Result<DetectorSummary, Error> {
    let groups = db.perceptual_digest_groups()?;
    let mut summary = DetectorSummary::new(Detector::Fingerprint);
    reporter.on_stage_start("detect-fingerprint", groups.len());

    for (i, (_digest, members)) in groups.iter().enumerate() {
        summary.examined += 1;
        let Some(canonical) = pick_canonical(members) else {
            summary.skipped += 1;
            continue;
        };
        for &(duplicate, _) in members.iter().filter(|(id, _)| *id != canonical) {
            summary.record(
                db,
                &NewEvidence {
                    canonical_id: canonical,
                    duplicate_id: duplicate,
                    reason: EvidenceReason::Fingerprint,
                    confidence: FINGERPRINT_CONFIDENCE,
                },
            );
        }
        reporter.on_stage_progress(i + 1);
    }

    Ok(summary)
}
