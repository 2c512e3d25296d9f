use axum::{extract::State, Json};
use serde::Serialize;

use crate::{error::AppJsonResult, pipeline::PollerStatus, ServerState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusResponse {
    pub email: PollerStatus,
    pub meeting: PollerStatus,
    pub prompt_limiter: String,
}

pub async fn health() -> &'static str {
    "OK"
}

/// Read-only snapshot of both schedulers.
pub async fn pipeline_status(
    State(state): State<ServerState>,
) -> AppJsonResult<PipelineStatusResponse> {
    Ok(Json(PipelineStatusResponse {
        email: state.email_poller.status(),
        meeting: state.meeting_poller.status(),
        prompt_limiter: state.rate_limiters.get_status(),
    }))
}
