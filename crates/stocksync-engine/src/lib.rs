//! Stock sync engine: change recording, alert deduplication, due-time
//! selection, per-supplier orchestration, and the action router.

pub mod actions;
pub mod alerts;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod recorder;
pub mod store;

use uuid::Uuid;

pub use actions::{dispatch, Action, ActionError, ActionRequest, ActionResponse};
pub use alerts::{
    check_alerts, ensure_alert, plan_alert, AlertCheck, AlertOutcome, AlertRequest, AlertSweep,
};
pub use error::EngineError;
pub use gate::due_configs;
pub use orchestrator::{SweepSummary, SyncOrchestrator, SyncRunResult, SyncSettings};
pub use recorder::{record_change, ChangeContext, RecordedChange};
pub use store::{AppliedStockChange, InMemoryStore, PgStore, StockStore};

/// First eight characters of a user id, for logs.
#[must_use]
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_keeps_eight_chars() {
        let id = Uuid::parse_str("0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0").unwrap();
        assert_eq!(short_id(id), "0f1e2d3c");
    }
}
