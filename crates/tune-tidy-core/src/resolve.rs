use crate::error::Error;
use crate::storage::models::EvidenceEdge;
use crate::storage::Database;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Default, Clone)]
pub struct ResolveSummary {
    /// Items with at least one incoming edge.
    pub items_with_evidence: usize,
    /// Annotations written because the stored value differed.
    pub updated: usize,
}

/// Strongest edge by reason priority, then confidence. Earlier edges win exact ties.
pub fn strongest<'a>(edges: impl IntoIterator<Item = &'a EvidenceEdge>) -> Option<&'a EvidenceEdge> {
    edges.into_iter().fold(None, |best: Option<&EvidenceEdge>, edge| match best {
        Some(b)
            if (b.reason.priority(), b.confidence) >= (edge.reason.priority(), edge.confidence) =>
        {
            Some(b)
        }
        _ => Some(edge),
    })
}

/// Annotate every duplicate-side item with its strongest evidence. Status is never touched.
pub fn resolve(db: &Database) -> Result<ResolveSummary, Error> {
    let edges = db.list_evidence()?;
    let mut by_item: BTreeMap<i64, Vec<&EvidenceEdge>> = BTreeMap::new();
    for edge in &edges {
        by_item.entry(edge.duplicate_id).or_default().push(edge);
    }

    let mut summary = ResolveSummary {
        items_with_evidence: by_item.len(),
        updated: 0,
    };
    for (item_id, incoming) in &by_item {
        let Some(best) = strongest(incoming.iter().copied()) else {
            continue;
        };
        if db.set_evidence_annotation(*item_id, best.reason, best.confidence)? {
            debug!("Item {} annotated {} ({:.2})", item_id, best.reason, best.confidence);
            summary.updated += 1;
        }
    }

    info!(
        "Resolved {} items, {} annotations changed",
        summary.items_with_evidence, summary.updated
    );
    Ok(summary)
}
