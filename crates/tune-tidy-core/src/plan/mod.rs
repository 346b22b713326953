//! Intent producers. Planners only ever queue `pending` intents through
//! [`Database::queue_intent`](crate::storage::Database::queue_intent); the executor is the
//! only stage that touches the filesystem.

pub mod cleanup;
pub mod duplicates;
pub mod migrations;

pub use cleanup::plan_cleanup;
pub use duplicates::{choose_keeper, plan_duplicates, PlanOptions, Rejection};
pub use migrations::plan_migrations;

#[derive(Debug, Default, Clone)]
pub struct PlanSummary {
    /// Candidates examined.
    pub considered: usize,
    /// Intents queued (or that would be queued in dry-run).
    pub queued: usize,
    /// Safety filter rejections.
    pub rejected: usize,
    /// Already covered by a pending or applied intent.
    pub already_planned: usize,
}
