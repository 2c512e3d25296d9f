pub mod email_poller;
pub mod materializer;
pub mod meeting_poller;
pub mod meeting_processor;

use serde::Serialize;

/// Snapshot of one background scheduler, queryable without mutating state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatus {
    pub is_running: bool,
    pub poll_interval_secs: u64,
}
