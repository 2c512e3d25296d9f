use anyhow::{anyhow, Context};
use chrono::Utc;

use crate::{db_core::prelude::*, error::AppResult, extract::MeetingDigest};

use entity::meeting_summary::{ActionItemList, StringList};

pub struct MeetingSummaryCtrl;

impl MeetingSummaryCtrl {
    /// Persists the digest for a meeting, replacing any summary left behind
    /// by an earlier attempt. The stored action item list is exactly the
    /// digest's, so positional task back-references stay valid.
    pub async fn store(
        conn: &DatabaseConnection,
        meeting: &meeting::Model,
        digest: &MeetingDigest,
    ) -> AppResult<meeting_summary::Model> {
        MeetingSummary::delete_many()
            .filter(meeting_summary::Column::MeetingId.eq(meeting.id))
            .exec(conn)
            .await
            .context("Error clearing stale summary")?;

        let now = Utc::now().fixed_offset();
        let active_model = meeting_summary::ActiveModel {
            id: ActiveValue::NotSet,
            meeting_id: ActiveValue::Set(meeting.id),
            user_id: ActiveValue::Set(meeting.user_id),
            summary: ActiveValue::Set(digest.summary.clone()),
            key_points: ActiveValue::Set(StringList(digest.key_points.clone())),
            decisions_made: ActiveValue::Set(StringList(digest.decisions_made.clone())),
            action_items: ActiveValue::Set(ActionItemList(digest.action_items.clone())),
            topics_discussed: ActiveValue::Set(StringList(digest.topics_discussed.clone())),
            participants_mentioned: ActiveValue::Set(StringList(
                digest.participants_mentioned.clone(),
            )),
            next_meeting: ActiveValue::Set(digest.next_meeting.clone()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let summary = active_model
            .insert(conn)
            .await
            .context("Error storing meeting summary")?;

        Ok(summary)
    }

    pub async fn find_by_meeting_id(
        conn: &DatabaseConnection,
        meeting_id: i32,
    ) -> AppResult<Option<meeting_summary::Model>> {
        let summary = MeetingSummary::find()
            .filter(meeting_summary::Column::MeetingId.eq(meeting_id))
            .one(conn)
            .await
            .context("Error fetching meeting summary")?;

        Ok(summary)
    }

    /// Backfills the created task's id into action item `index`. Read-modify-
    /// write on the JSON column; the caller treats failure as a logged
    /// inconsistency, never as a reason to roll the task back.
    pub async fn set_action_item_task_id(
        conn: &DatabaseConnection,
        meeting_id: i32,
        index: usize,
        task_id: i32,
    ) -> AppResult<()> {
        let summary = Self::find_by_meeting_id(conn, meeting_id)
            .await?
            .ok_or_else(|| anyhow!("No summary found for meeting {}", meeting_id))?;

        let mut items = summary.action_items.clone();
        let item = items
            .0
            .get_mut(index)
            .ok_or_else(|| anyhow!("Action item index {} out of range", index))?;
        item.task_id = Some(task_id);

        MeetingSummary::update(meeting_summary::ActiveModel {
            id: ActiveValue::Set(summary.id),
            action_items: ActiveValue::Set(items),
            updated_at: ActiveValue::Set(Utc::now().fixed_offset()),
            ..Default::default()
        })
        .exec(conn)
        .await
        .context("Error writing task reference into summary")?;

        Ok(())
    }
}
