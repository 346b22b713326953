use super::PlanSummary;
use crate::error::Error;
use crate::storage::models::{IntentKind, IntentStatus, ItemStatus, NewIntent};
use crate::storage::Database;
use std::collections::HashSet;
use tracing::{debug, info};

/// Queue `migrate` intents moving untouched items to their recommended destination.
///
/// Only `new` items with a destination different from their location qualify. When two
/// items map to the same destination only the lower id is planned.
pub fn plan_migrations(db: &Database, dry_run: bool) -> Result<PlanSummary, Error> {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let mut summary = PlanSummary::default();
    // Occupied locations and destinations of already queued moves.
    let mut claimed: HashSet<String> = db.list_items()?.into_iter().map(|i| i.location).collect();
    claimed.extend(
        db.list_intents_with_status(IntentStatus::Pending)?
            .into_iter()
            .filter(|i| i.kind == IntentKind::Migrate)
            .filter_map(|i| i.dst_path),
    );

    for item in db.list_items_with_status(ItemStatus::New)? {
        let Some(destination) = item.destination.as_deref() else {
            continue;
        };
        if destination == item.location {
            continue;
        }
        summary.considered += 1;

        if db.find_pending_intent_for_item(item.id)?.is_some() {
            summary.already_planned += 1;
            continue;
        }
        if !claimed.insert(destination.to_string()) {
            debug!("{}Item {}: destination {} already taken", prefix, item.id, destination);
            summary.rejected += 1;
            continue;
        }

        info!("{}Migrate item {}: {} -> {}", prefix, item.id, item.location, destination);
        if dry_run {
            summary.queued += 1;
            continue;
        }
        let queued = db.queue_intent(&NewIntent {
            item_id: Some(item.id),
            kind: IntentKind::Migrate,
            src_path: item.location.clone(),
            dst_path: Some(destination.to_string()),
        })?;
        match queued {
            Some(_) => summary.queued += 1,
            None => summary.already_planned += 1,
        }
    }

    info!(
        "{}Migration plan: {} considered, {} queued, {} rejected, {} already planned",
        prefix, summary.considered, summary.queued, summary.rejected, summary.already_planned
    );
    Ok(summary)
}
