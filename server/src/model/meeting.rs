use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::{
    connectors::calendar::DiscoveredMeeting,
    db_core::prelude::*,
    error::{is_unique_violation, AppError, AppResult},
};

use entity::meeting::AttendeeList;

pub struct MeetingCtrl;

#[derive(Debug, FromQueryResult)]
pub struct StatusCount {
    pub processing_status: ProcessingStatus,
    pub count: i64,
}

impl MeetingCtrl {
    pub async fn get_by_id(conn: &DatabaseConnection, meeting_id: i32) -> AppResult<meeting::Model> {
        let meeting = Meeting::find_by_id(meeting_id)
            .one(conn)
            .await
            .context("Error fetching meeting")?
            .ok_or(AppError::NotFound("Meeting not found".to_string()))?;

        Ok(meeting)
    }

    pub async fn find_by_event(
        conn: &DatabaseConnection,
        calendar_event_id: &str,
        user_id: i32,
    ) -> AppResult<Option<meeting::Model>> {
        let meeting = Meeting::find()
            .filter(meeting::Column::CalendarEventId.eq(calendar_event_id))
            .filter(meeting::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .context("Error fetching meeting by event id")?;

        Ok(meeting)
    }

    /// Records a newly discovered meeting in `pending` state. Returns false
    /// when the (calendar_event_id, user_id) pair is already known, whether
    /// found up front or lost to a concurrent insert.
    pub async fn insert_discovered(
        conn: &DatabaseConnection,
        event: &DiscoveredMeeting,
        user_id: i32,
    ) -> AppResult<bool> {
        if Self::find_by_event(conn, &event.calendar_event_id, user_id)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let now = Utc::now().fixed_offset();
        let active_model = meeting::ActiveModel {
            id: ActiveValue::NotSet,
            calendar_event_id: ActiveValue::Set(event.calendar_event_id.clone()),
            user_id: ActiveValue::Set(user_id),
            title: ActiveValue::Set(event.title.clone()),
            description: ActiveValue::Set(event.description.clone()),
            start_time: ActiveValue::Set(event.start_time),
            end_time: ActiveValue::Set(event.end_time),
            attendees: ActiveValue::Set(AttendeeList(event.attendees.clone())),
            video_link: ActiveValue::Set(Some(event.video_link.clone())),
            recording_url: ActiveValue::Set(None),
            recording_id: ActiveValue::Set(None),
            processing_status: ActiveValue::Set(ProcessingStatus::Pending),
            processed_at: ActiveValue::Set(None),
            error_message: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        match Meeting::insert(active_model).exec(conn).await {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(
                    "Meeting {} already recorded by a concurrent pass",
                    event.calendar_event_id
                );
                Ok(false)
            }
            Err(e) => Err(e).context("Error inserting discovered meeting")?,
        }
    }

    pub async fn list_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
        status: Option<ProcessingStatus>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<meeting::Model>, u64)> {
        let mut query = Meeting::find().filter(meeting::Column::UserId.eq(user_id));

        if let Some(status) = status {
            query = query.filter(meeting::Column::ProcessingStatus.eq(status));
        }

        let paginator = query
            .order_by_desc(meeting::Column::StartTime)
            .paginate(conn, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Error counting meetings")?;
        let meetings = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Error fetching meeting page")?;

        Ok((meetings, total))
    }

    /// Single place every state transition goes through. `processed_at` and
    /// `error_message` are only written when provided, so a failed → retried
    /// meeting keeps its history until the next terminal state.
    pub async fn set_status(
        conn: &DatabaseConnection,
        meeting_id: i32,
        status: ProcessingStatus,
        processed_at: Option<DateTime<Utc>>,
        error_message: Option<String>,
    ) -> AppResult<()> {
        let mut active_model = meeting::ActiveModel {
            id: ActiveValue::Set(meeting_id),
            processing_status: ActiveValue::Set(status),
            updated_at: ActiveValue::Set(Utc::now().fixed_offset()),
            ..Default::default()
        };

        if let Some(at) = processed_at {
            active_model.processed_at = ActiveValue::Set(Some(at.fixed_offset()));
        }
        if let Some(message) = error_message {
            active_model.error_message = ActiveValue::Set(Some(message));
        }

        Meeting::update(active_model)
            .exec(conn)
            .await
            .context("Error updating meeting status")?;

        Ok(())
    }

    pub async fn status_counts(
        conn: &DatabaseConnection,
        user_id: i32,
    ) -> AppResult<Vec<StatusCount>> {
        let counts = Meeting::find()
            .filter(meeting::Column::UserId.eq(user_id))
            .select_only()
            .column(meeting::Column::ProcessingStatus)
            .column_as(meeting::Column::Id.count(), "count")
            .group_by(meeting::Column::ProcessingStatus)
            .into_model::<StatusCount>()
            .all(conn)
            .await
            .context("Error counting meetings by status")?;

        Ok(counts)
    }
}

#[cfg(test)]
#[cfg(feature = "integration")]
mod integration {
    use super::*;
    use crate::model::user::UserCtrl;
    use crate::testing::common::{discovered_meeting_fixture, setup};

    #[tokio::test]
    async fn test_duplicate_event_insert_is_rejected() {
        let (conn, _http_client) = setup().await;
        let email = format!("meeting_{}@example.com", chrono::Utc::now().timestamp_micros());
        let user = UserCtrl::create(&conn, &email, "Meeting Test", None)
            .await
            .unwrap();

        let event = discovered_meeting_fixture(&format!(
            "evt_{}",
            chrono::Utc::now().timestamp_micros()
        ));

        assert!(MeetingCtrl::insert_discovered(&conn, &event, user.id)
            .await
            .unwrap());
        // second discovery of the same event is a no-op
        assert!(!MeetingCtrl::insert_discovered(&conn, &event, user.id)
            .await
            .unwrap());

        let (meetings, total) = MeetingCtrl::list_for_user(&conn, user.id, None, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(meetings[0].processing_status, ProcessingStatus::Pending);

        User::delete_by_id(user.id).exec(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_transition_records_error() {
        let (conn, _http_client) = setup().await;
        let email = format!("meeting2_{}@example.com", chrono::Utc::now().timestamp_micros());
        let user = UserCtrl::create(&conn, &email, "Meeting Test", None)
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

        MeetingCtrl::set_status(
            &conn,
            meeting.id,
            ProcessingStatus::Failed,
            None,
            Some("No transcript or notes document found".to_string()),
        )
        .await
        .unwrap();

        let reloaded = MeetingCtrl::get_by_id(&conn, meeting.id).await.unwrap();
        assert_eq!(reloaded.processing_status, ProcessingStatus::Failed);
        assert!(reloaded.error_message.unwrap().contains("No transcript"));
        assert!(reloaded.processed_at.is_none());

        User::delete_by_id(user.id).exec(&conn).await.unwrap();
    }
}
