use anyhow::Context;
use chrono::Utc;

use crate::{db_core::prelude::*, error::AppResult};

use entity::meeting_transcript::SegmentList;

pub struct MeetingTranscriptCtrl;

impl MeetingTranscriptCtrl {
    /// Stores the transcript for a meeting, replacing any row left behind by
    /// an earlier failed attempt so a retry does not trip the unique key.
    pub async fn store(
        conn: &DatabaseConnection,
        meeting: &meeting::Model,
        transcript_text: &str,
    ) -> AppResult<meeting_transcript::Model> {
        MeetingTranscript::delete_many()
            .filter(meeting_transcript::Column::MeetingId.eq(meeting.id))
            .exec(conn)
            .await
            .context("Error clearing stale transcript")?;

        let active_model = meeting_transcript::ActiveModel {
            id: ActiveValue::NotSet,
            meeting_id: ActiveValue::Set(meeting.id),
            user_id: ActiveValue::Set(meeting.user_id),
            transcript_text: ActiveValue::Set(transcript_text.to_string()),
            // Notes documents carry no speaker breakdown
            segments: ActiveValue::Set(SegmentList::default()),
            language: ActiveValue::Set("en-US".to_string()),
            confidence: ActiveValue::Set(1.0),
            created_at: ActiveValue::Set(Utc::now().fixed_offset()),
        };

        let transcript = active_model
            .insert(conn)
            .await
            .context("Error storing transcript")?;

        Ok(transcript)
    }

    pub async fn find_by_meeting_id(
        conn: &DatabaseConnection,
        meeting_id: i32,
    ) -> AppResult<Option<meeting_transcript::Model>> {
        let transcript = MeetingTranscript::find()
            .filter(meeting_transcript::Column::MeetingId.eq(meeting_id))
            .one(conn)
            .await
            .context("Error fetching transcript")?;

        Ok(transcript)
    }
}
