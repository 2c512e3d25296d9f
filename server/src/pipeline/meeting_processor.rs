use anyhow::anyhow;
use chrono::Utc;

use crate::{
    connectors::{drive::DriveClient, google},
    db_core::prelude::*,
    error::{AppError, AppResult},
    extract::{self, MeetingDigest, TaskCandidate},
    model::{
        meeting::MeetingCtrl, meeting_summary::MeetingSummaryCtrl,
        meeting_transcript::MeetingTranscriptCtrl, user::UserCtrl,
    },
    pipeline::materializer::{self, TaskProvenance},
    rate_limiters::RateLimiters,
    HttpClient,
};

/// Drives one meeting through transcript lookup, summarization, and task
/// materialization. Every step error lands the meeting in `failed` with the
/// message recorded; it never stays stuck in `processing` after a crash of
/// this routine.
#[derive(Clone)]
pub struct MeetingProcessor {
    conn: DatabaseConnection,
    http_client: HttpClient,
    rate_limiters: RateLimiters,
}

impl MeetingProcessor {
    pub fn new(conn: DatabaseConnection, http_client: HttpClient, rate_limiters: RateLimiters) -> Self {
        Self {
            conn,
            http_client,
            rate_limiters,
        }
    }

    pub async fn process(&self, meeting_id: i32) -> AppResult<()> {
        let meeting = MeetingCtrl::get_by_id(&self.conn, meeting_id).await?;

        tracing::info!("Processing meeting {} '{}'", meeting.id, meeting.title);

        MeetingCtrl::set_status(&self.conn, meeting.id, ProcessingStatus::Processing, None, None)
            .await?;

        match self.run_steps(&meeting).await {
            Ok(tasks_created) => {
                MeetingCtrl::set_status(
                    &self.conn,
                    meeting.id,
                    ProcessingStatus::Completed,
                    Some(Utc::now()),
                    None,
                )
                .await?;
                tracing::info!(
                    "Meeting {} processed, created {} tasks",
                    meeting.id,
                    tasks_created
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error processing meeting {}: {:?}", meeting.id, e);
                let failure = MeetingCtrl::set_status(
                    &self.conn,
                    meeting.id,
                    ProcessingStatus::Failed,
                    None,
                    Some(e.to_string()),
                )
                .await;
                if let Err(write_err) = failure {
                    // the meeting stays in `processing`; accepted degraded
                    // outcome, an explicit retry is required either way
                    tracing::error!(
                        "Could not record failure for meeting {}: {:?}",
                        meeting.id,
                        write_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_steps(&self, meeting: &meeting::Model) -> AppResult<usize> {
        let user = UserCtrl::get_by_id(&self.conn, meeting.user_id).await?;
        let tokens = user
            .calendar_tokens
            .as_ref()
            .ok_or_else(|| anyhow!("User {} has no document access", user.email))?;

        let access_token =
            google::refresh_access_token(&self.http_client, &tokens.refresh_token).await?;
        let drive_client = DriveClient::new(self.http_client.clone(), access_token);

        let document = drive_client
            .find_meeting_document(&meeting.title, meeting.start_time)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No transcript or notes document found for meeting".to_string())
            })?;

        tracing::info!("Reading meeting document '{}'", document.name);

        let transcript_text = drive_client
            .document_text(&document.id)
            .await?
            .ok_or_else(|| anyhow!("Meeting document '{}' was empty or unreadable", document.name))?;

        MeetingTranscriptCtrl::store(&self.conn, meeting, &transcript_text).await?;

        let attendee_names: Vec<String> = meeting
            .attendees
            .0
            .iter()
            .filter_map(|a| a.name.clone().or_else(|| a.email.clone()))
            .collect();

        let digest = extract::summarize_meeting(
            &self.http_client,
            &self.rate_limiters,
            &meeting.title,
            &attendee_names,
            &transcript_text,
        )
        .await?;

        MeetingSummaryCtrl::store(&self.conn, meeting, &digest).await?;

        let candidates = action_item_candidates(&digest);
        let tasks_created = materializer::create_tasks(
            &self.conn,
            &candidates,
            &user,
            &TaskProvenance::Meeting {
                meeting_id: meeting.id,
                meeting_title: meeting.title.clone(),
                meeting_date: meeting.start_time,
            },
        )
        .await;

        Ok(tasks_created)
    }
}

/// Converts the digest's action items into candidates, position for
/// position, so the materializer's back-references index into the stored
/// summary correctly.
pub fn action_item_candidates(digest: &MeetingDigest) -> Vec<TaskCandidate> {
    digest
        .action_items
        .iter()
        .map(|item| TaskCandidate {
            title: extract::normalize::clamp_title(&item.description),
            description: item
                .context
                .clone()
                .unwrap_or_else(|| item.description.clone()),
            priority: item.priority,
            deadline: item.deadline,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use entity::meeting_summary::ActionItem;

    fn digest_with_items(items: Vec<ActionItem>) -> MeetingDigest {
        MeetingDigest {
            summary: "s".to_string(),
            key_points: vec![],
            decisions_made: vec![],
            action_items: items,
            topics_discussed: vec![],
            participants_mentioned: vec![],
            next_meeting: None,
        }
    }

    #[test]
    fn test_action_item_candidates_keep_order_and_fields() {
        let digest = digest_with_items(vec![
            ActionItem {
                description: "Update API documentation".to_string(),
                assigned_to: "Sarah".to_string(),
                priority: TaskPriority::High,
                deadline: NaiveDate::from_ymd_opt(2025, 11, 22),
                context: Some("Needed before release".to_string()),
                task_id: None,
            },
            ActionItem {
                description: "Finalize API design".to_string(),
                assigned_to: "Team".to_string(),
                priority: TaskPriority::Medium,
                deadline: None,
                context: None,
                task_id: None,
            },
        ]);

        let candidates = action_item_candidates(&digest);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Update API documentation");
        assert_eq!(candidates[0].description, "Needed before release");
        assert_eq!(candidates[0].priority, TaskPriority::High);
        assert_eq!(candidates[1].description, "Finalize API design");
        assert_eq!(candidates[1].deadline, None);
    }

    #[test]
    fn test_long_action_item_description_clamped_in_title() {
        let digest = digest_with_items(vec![ActionItem {
            description: "d".repeat(160),
            assigned_to: "Unassigned".to_string(),
            priority: TaskPriority::Medium,
            deadline: None,
            context: None,
            task_id: None,
        }]);

        let candidates = action_item_candidates(&digest);
        assert_eq!(candidates[0].title.chars().count(), 100);
        assert_eq!(candidates[0].description.chars().count(), 160);
    }
}

#[cfg(test)]
#[cfg(feature = "integration")]
mod integration {
    use super::*;
    use crate::model::user::UserCtrl;
    use crate::rate_limiters::RateLimiters;
    use crate::testing::common::{discovered_meeting_fixture, setup};
    use entity::user::CalendarTokens;

    /// A meeting whose document lookup cannot succeed must land in `failed`,
    /// never `completed`, and record why.
    #[tokio::test]
    async fn test_failed_document_lookup_transitions_to_failed() {
        let (conn, http_client) = setup().await;
        let email = format!("proc_{}@example.com", chrono::Utc::now().timestamp_micros());
        let user = UserCtrl::create(&conn, &email, "Processor Test", None)
            .await
            .unwrap();
        UserCtrl::set_calendar_tokens(
            &conn,
            user.id,
            CalendarTokens {
                access_token: None,
                refresh_token: "invalid-refresh-token".to_string(),
            },
        )
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

        let processor = MeetingProcessor::new(conn.clone(), http_client, RateLimiters::from_env());
        let result = processor.process(meeting.id).await;
        assert!(result.is_err());

        let reloaded = MeetingCtrl::get_by_id(&conn, meeting.id).await.unwrap();
        assert_eq!(reloaded.processing_status, ProcessingStatus::Failed);
        assert!(reloaded.error_message.is_some());

        User::delete_by_id(user.id).exec(&conn).await.unwrap();
    }
}
