use super::PlanSummary;
use crate::config::PlannerConfig;
use crate::error::Error;
use crate::storage::models::{IntentKind, ItemRecord, NewIntent, PlanEligible, StrongReason};
use crate::storage::Database;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub exact_min_confidence: f64,
    pub fingerprint_min_confidence: f64,
    pub dry_run: bool,
}

impl PlanOptions {
    pub fn from_config(config: &PlannerConfig, dry_run: bool) -> Self {
        Self {
            exact_min_confidence: config.min_confidence,
            fingerprint_min_confidence: config.fingerprint_min_confidence,
            dry_run,
        }
    }

    fn threshold(&self, reason: StrongReason) -> f64 {
        match reason {
            StrongReason::ExactDigest => self.exact_min_confidence,
            StrongReason::Fingerprint => self.fingerprint_min_confidence,
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default(), false)
    }
}

/// Why a candidate pair was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    DifferentGrouping,
    DifferentAttribution,
    Compilation,
    KeeperScheduledForRemoval,
    KeptByReview,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::DifferentGrouping => "different album",
            Rejection::DifferentAttribution => "different artist",
            Rejection::Compilation => "compilation track",
            Rejection::KeeperScheduledForRemoval => "keeper is being removed",
            Rejection::KeptByReview => "review chose to keep it",
        })
    }
}

/// Same album, same primary attribution, and neither side a compilation track.
pub fn safety_check(a: &ItemRecord, b: &ItemRecord) -> Result<(), Rejection> {
    if a.album != b.album {
        return Err(Rejection::DifferentGrouping);
    }
    if a.attribution() != b.attribution() {
        return Err(Rejection::DifferentAttribution);
    }
    if a.is_compilation || b.is_compilation {
        return Err(Rejection::Compilation);
    }
    Ok(())
}

/// Ordering where `Greater` means `a` is the better copy to keep.
fn keeper_order(a: &ItemRecord, b: &ItemRecord) -> Ordering {
    a.is_lossless()
        .cmp(&b.is_lossless())
        .then_with(|| match (a.bitrate_kbps, b.bitrate_kbps) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        })
        .then_with(|| a.size_bytes.cmp(&b.size_bytes))
        .then_with(|| b.id.cmp(&a.id))
}

/// Returns (keeper, loser).
pub fn choose_keeper<'a>(a: &'a ItemRecord, b: &'a ItemRecord) -> (&'a ItemRecord, &'a ItemRecord) {
    match keeper_order(a, b) {
        Ordering::Less => (b, a),
        _ => (a, b),
    }
}

/// Turn strong evidence into `archive` intents for the weaker copy of each pair.
pub fn plan_duplicates(db: &Database, options: &PlanOptions) -> Result<PlanSummary, Error> {
    let eligible: Vec<PlanEligible> = db
        .list_evidence()?
        .into_iter()
        .filter_map(PlanEligible::from_edge)
        .filter(|e| e.confidence() >= options.threshold(e.reason()))
        .collect();

    let mut summary = PlanSummary::default();
    // Losers chosen earlier in this run, so dry-run matches a real run.
    let mut scheduled: HashSet<i64> = HashSet::new();
    let prefix = if options.dry_run { "[dry-run] " } else { "" };

    for candidate in &eligible {
        summary.considered += 1;
        let edge = candidate.edge();
        let (Some(a), Some(b)) = (db.get_item(edge.canonical_id)?, db.get_item(edge.duplicate_id)?)
        else {
            debug!("Edge {} references a missing item", edge.id);
            summary.rejected += 1;
            continue;
        };

        if let Err(rejection) = safety_check(&a, &b) {
            debug!("{}Pair {}/{} rejected: {}", prefix, a.id, b.id, rejection);
            summary.rejected += 1;
            continue;
        }

        if db.has_applied_skip(a.id)? || db.has_applied_skip(b.id)? {
            debug!("{}Pair {}/{} rejected: {}", prefix, a.id, b.id, Rejection::KeptByReview);
            summary.rejected += 1;
            continue;
        }

        let (keeper, loser) = choose_keeper(&a, &b);

        if scheduled.contains(&loser.id)
            || db.find_pending_intent_for_item(loser.id)?.is_some()
            || db.has_applied_removal(loser.id)?
        {
            summary.already_planned += 1;
            continue;
        }
        if scheduled.contains(&keeper.id)
            || is_pending_removal(db, keeper.id)?
            || db.has_applied_removal(keeper.id)?
        {
            debug!(
                "{}Pair {}/{} rejected: {}",
                prefix,
                a.id,
                b.id,
                Rejection::KeeperScheduledForRemoval
            );
            summary.rejected += 1;
            continue;
        }

        info!(
            "{}Archive item {} ({}), keep item {} [{} {:.2}]",
            prefix, loser.id, loser.location, keeper.id, edge.reason, edge.confidence
        );
        scheduled.insert(loser.id);
        if options.dry_run {
            summary.queued += 1;
            continue;
        }

        let queued = db.queue_intent(&NewIntent {
            item_id: Some(loser.id),
            kind: IntentKind::Archive,
            src_path: loser.location.clone(),
            dst_path: None,
        })?;
        match queued {
            Some(_) => summary.queued += 1,
            None => summary.already_planned += 1,
        }
    }

    info!(
        "{}Duplicate plan: {} considered, {} queued, {} rejected, {} already planned",
        prefix, summary.considered, summary.queued, summary.rejected, summary.already_planned
    );
    Ok(summary)
}

fn is_pending_removal(db: &Database, item_id: i64) -> Result<bool, Error> {
    let Some(intent_id) = db.find_pending_intent_for_item(item_id)? else {
        return Ok(false);
    };
    Ok(db
        .get_intent(intent_id)?
        .map(|i| matches!(i.kind, IntentKind::Archive | IntentKind::RemoveSoft))
        .unwrap_or(false))
}
