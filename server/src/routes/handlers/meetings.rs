use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::jwt::Claims,
    db_core::prelude::*,
    error::{AppError, AppJsonResult},
    model::{
        meeting::MeetingCtrl, meeting_summary::MeetingSummaryCtrl,
        meeting_transcript::MeetingTranscriptCtrl,
    },
    pipeline::meeting_processor::MeetingProcessor,
    ServerState,
};

use super::{clamp_page_params, Pagination};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeetingsParams {
    pub status: Option<ProcessingStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListResponse {
    pub meetings: Vec<meeting::Model>,
    pub pagination: Pagination,
}

pub async fn list(
    claims: Claims,
    State(state): State<ServerState>,
    Query(params): Query<ListMeetingsParams>,
) -> AppJsonResult<MeetingListResponse> {
    let (page, per_page) = clamp_page_params(params.page, params.per_page);

    let (meetings, total) =
        MeetingCtrl::list_for_user(&state.conn, claims.sub, params.status, page, per_page).await?;

    Ok(Json(MeetingListResponse {
        meetings,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetailResponse {
    pub meeting: meeting::Model,
    pub summary: Option<meeting_summary::Model>,
    pub transcript: Option<meeting_transcript::Model>,
}

pub async fn get_by_id(
    claims: Claims,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> AppJsonResult<MeetingDetailResponse> {
    let meeting = owned_meeting(&state, id, claims.sub).await?;

    let summary = MeetingSummaryCtrl::find_by_meeting_id(&state.conn, meeting.id).await?;
    let transcript = MeetingTranscriptCtrl::find_by_meeting_id(&state.conn, meeting.id).await?;

    Ok(Json(MeetingDetailResponse {
        meeting,
        summary,
        transcript,
    }))
}

/// Manual processing trigger. Sets `processing` eagerly so a second
/// concurrent trigger is rejected with a conflict, then runs the heavy work
/// on a spawned task.
pub async fn process(
    claims: Claims,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> AppJsonResult<serde_json::Value> {
    let meeting = owned_meeting(&state, id, claims.sub).await?;

    if meeting.processing_status == ProcessingStatus::Processing {
        return Err(AppError::Conflict(
            "Meeting is already being processed".to_string(),
        ));
    }

    MeetingCtrl::set_status(
        &state.conn,
        meeting.id,
        ProcessingStatus::Processing,
        None,
        None,
    )
    .await?;

    let processor = MeetingProcessor::new(
        state.conn.clone(),
        state.http_client.clone(),
        state.rate_limiters.clone(),
    );
    let meeting_id = meeting.id;
    tokio::spawn(async move {
        if let Err(e) = processor.process(meeting_id).await {
            tracing::error!("Background processing of meeting {} failed: {:?}", meeting_id, e);
        }
    });

    Ok(Json(json!({
        "meetingId": meeting.id,
        "status": "processing",
        "message": "Meeting processing started. This may take a few minutes."
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStatsResponse {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

pub async fn stats(
    claims: Claims,
    State(state): State<ServerState>,
) -> AppJsonResult<MeetingStatsResponse> {
    let counts = MeetingCtrl::status_counts(&state.conn, claims.sub).await?;

    let mut stats = MeetingStatsResponse {
        total: 0,
        pending: 0,
        processing: 0,
        completed: 0,
        failed: 0,
    };
    for row in counts {
        stats.total += row.count;
        match row.processing_status {
            ProcessingStatus::Pending => stats.pending = row.count,
            ProcessingStatus::Processing => stats.processing = row.count,
            ProcessingStatus::Completed => stats.completed = row.count,
            ProcessingStatus::Failed => stats.failed = row.count,
        }
    }

    Ok(Json(stats))
}

async fn owned_meeting(
    state: &ServerState,
    meeting_id: i32,
    user_id: i32,
) -> Result<meeting::Model, AppError> {
    let meeting = MeetingCtrl::get_by_id(&state.conn, meeting_id).await?;
    if meeting.user_id != user_id {
        return Err(AppError::NotFound("Meeting not found".to_string()));
    }
    Ok(meeting)
}

#[cfg(test)]
#[cfg(feature = "integration")]
mod integration {
    use super::*;
    use crate::auth::jwt::Claims;
    use crate::model::user::UserCtrl;
    use crate::pipeline::{email_poller::EmailPoller, meeting_poller::MeetingPoller};
    use crate::rate_limiters::RateLimiters;
    use crate::testing::common::{discovered_meeting_fixture, setup};
    use axum::extract::{Path, State};
    use std::time::Duration;

    fn claims_for(user: &user::Model) -> Claims {
        Claims {
            sub: user.id,
            email: user.email.clone(),
            exp: chrono::Utc::now().timestamp() as usize + 300,
        }
    }

    fn server_state(conn: DatabaseConnection, http_client: crate::HttpClient) -> ServerState {
        let rate_limiters = RateLimiters::from_env();
        ServerState {
            email_poller: EmailPoller::new(
                conn.clone(),
                http_client.clone(),
                rate_limiters.clone(),
                Duration::from_secs(300),
            ),
            meeting_poller: MeetingPoller::new(
                conn.clone(),
                http_client.clone(),
                Duration::from_secs(300),
            ),
            http_client,
            conn,
            rate_limiters,
        }
    }

    /// A meeting already in `processing` rejects a second trigger with a
    /// conflict instead of starting the routine again.
    #[tokio::test]
    async fn test_concurrent_trigger_is_rejected() {
        let (conn, http_client) = setup().await;
        let email = format!("trig_{}@example.com", chrono::Utc::now().timestamp_micros());
        let user = UserCtrl::create(&conn, &email, "Trigger Test", None)
            .await
            .unwrap();

        let event = discovered_meeting_fixture(&format!(
            "evt_{}",
            chrono::Utc::now().timestamp_micros()
        ));
        MeetingCtrl::insert_discovered(&conn, &event, user.id)
            .await
            .unwrap();
        let meeting = MeetingCtrl::find_by_event(&conn, &event.calendar_event_id, user.id)
            .await
            .unwrap()
            .unwrap();

        MeetingCtrl::set_status(&conn, meeting.id, ProcessingStatus::Processing, None, None)
            .await
            .unwrap();

        let state = server_state(conn.clone(), http_client);
        let result = process(claims_for(&user), State(state), Path(meeting.id)).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));

        User::delete_by_id(user.id).exec(&conn).await.unwrap();
    }
}
