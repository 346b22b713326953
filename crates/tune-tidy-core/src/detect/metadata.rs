use super::{Detector, DetectorSummary};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::{EvidenceReason, ItemRecord, NewEvidence};
use crate::storage::Database;
use tracing::trace;

pub const SCORE_THRESHOLD: f64 = 0.75;
const DURATION_BONUS: f64 = 0.05;
const DURATION_TOLERANCE_SECS: f64 = 3.0;

/// Normalized edit similarity in [0, 1] on trimmed, lower-cased text.
/// A missing or empty side scores 0.
pub fn similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Weighted attribution and title similarity, plus a small bonus for matching durations.
pub fn score(a: &ItemRecord, b: &ItemRecord) -> f64 {
    let attribution = similarity(a.attribution(), b.attribution());
    let title = similarity(a.title.as_deref(), b.title.as_deref());
    let mut score = 0.5 * attribution + 0.5 * title;
    if let (Some(da), Some(db)) = (a.duration_secs, b.duration_secs) {
        if (da - db).abs() <= DURATION_TOLERANCE_SECS {
            score += DURATION_BONUS;
        }
    }
    score
}

pub fn confidence_for(score: f64) -> f64 {
    if score >= 0.90 {
        0.95
    } else if score >= SCORE_THRESHOLD {
        0.80
    } else {
        0.65
    }
}

/// Pairwise comparison over items not already explained by stronger evidence.
/// The lower id of each pair is canonical.
pub fn detect(db: &Database, reporter: &dyn ProgressReporter) -> Result<DetectorSummary, Error> {
    let items = db.metadata_candidates()?;
    let mut summary = DetectorSummary::new(Detector::Metadata);
    reporter.on_stage_start("detect-metadata", items.len());

    // items arrive in ascending id order
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            summary.examined += 1;
            if a.is_compilation != b.is_compilation {
                summary.skipped += 1;
                continue;
            }
            let s = score(a, b);
            if s < SCORE_THRESHOLD {
                continue;
            }
            trace!("Items {} and {} score {:.3}", a.id, b.id, s);
            summary.record(
                db,
                &NewEvidence {
                    canonical_id: a.id,
                    duplicate_id: b.id,
                    reason: EvidenceReason::MetadataSimilarity,
                    confidence: confidence_for(s),
                },
            );
        }
        reporter.on_stage_progress(i + 1);
    }

    Ok(summary)
}
