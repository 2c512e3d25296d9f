use anyhow::Context;
use chrono::{Duration, Utc};

use crate::{db_core::prelude::*, error::AppResult};

pub struct ProcessedEmailCtrl;

impl ProcessedEmailCtrl {
    /// Cheap pre-check before spending an extraction call on a message. Not
    /// the correctness guarantee: the composite key on the table is.
    pub async fn is_processed(
        conn: &DatabaseConnection,
        email_id: &str,
        user_id: i32,
    ) -> AppResult<bool> {
        let existing = ProcessedEmail::find_by_id((email_id.to_string(), user_id))
            .one(conn)
            .await
            .context("Error checking processed email")?;

        Ok(existing.is_some())
    }

    /// Records the terminal outcome for one message, including "no tasks
    /// found" (tasks_created = 0). Fails with a unique violation when a
    /// record for (email_id, user_id) already exists; callers decide whether
    /// that is a race to tolerate or a bug to surface.
    pub async fn mark_processed(
        conn: &DatabaseConnection,
        email_id: &str,
        user_id: i32,
        tasks_created: i32,
    ) -> Result<InsertResult<processed_email::ActiveModel>, DbErr> {
        let active_model = processed_email::ActiveModel {
            email_id: ActiveValue::Set(email_id.to_string()),
            user_id: ActiveValue::Set(user_id),
            tasks_created: ActiveValue::Set(tasks_created),
            processed_at: ActiveValue::Set(Utc::now().fixed_offset()),
        };

        ProcessedEmail::insert(active_model).exec(conn).await
    }

    pub async fn count_for_user(conn: &DatabaseConnection, user_id: i32) -> AppResult<u64> {
        let count = ProcessedEmail::find()
            .filter(processed_email::Column::UserId.eq(user_id))
            .count(conn)
            .await
            .context("Error counting processed emails")?;

        Ok(count)
    }

    /// Retention sweep: drops ledger rows older than the cutoff. Dedup for a
    /// message only matters while the fetch window can still reach it.
    pub async fn cleanup(conn: &DatabaseConnection, older_than_days: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::days(older_than_days);

        let result = ProcessedEmail::delete_many()
            .filter(processed_email::Column::ProcessedAt.lt(cutoff))
            .exec(conn)
            .await
            .context("Error cleaning up processed email records")?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[cfg(feature = "integration")]
mod integration {
    use super::*;
    use crate::error::is_unique_violation;
    use crate::model::user::UserCtrl;
    use crate::testing::common::setup;

    #[tokio::test]
    async fn test_mark_processed_twice_fails_and_keeps_first_count() {
        let (conn, _http_client) = setup().await;
        let email = format!("ledger_{}@example.com", chrono::Utc::now().timestamp_micros());
        let user = UserCtrl::create(&conn, &email, "Ledger Test", None)
            .await
            .unwrap();

        let message_id = format!("msg_{}", chrono::Utc::now().timestamp_micros());

        ProcessedEmailCtrl::mark_processed(&conn, &message_id, user.id, 3)
            .await
            .unwrap();

        let second = ProcessedEmailCtrl::mark_processed(&conn, &message_id, user.id, 7).await;
        assert!(second.is_err());
        assert!(is_unique_violation(&second.unwrap_err()));

        let stored = ProcessedEmail::find_by_id((message_id.clone(), user.id))
            .one(&conn)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.tasks_created, 3);

        User::delete_by_id(user.id).exec(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_is_processed_roundtrip() {
        let (conn, _http_client) = setup().await;
        let email = format!("ledger2_{}@example.com", chrono::Utc::now().timestamp_micros());
        let user = UserCtrl::create(&conn, &email, "Ledger Test", None)
            .await
            .unwrap();

        let message_id = format!("msg_{}", chrono::Utc::now().timestamp_micros());
        assert!(!ProcessedEmailCtrl::is_processed(&conn, &message_id, user.id)
            .await
            .unwrap());

        ProcessedEmailCtrl::mark_processed(&conn, &message_id, user.id, 0)
            .await
            .unwrap();
        assert!(ProcessedEmailCtrl::is_processed(&conn, &message_id, user.id)
            .await
            .unwrap());

        User::delete_by_id(user.id).exec(&conn).await.unwrap();
    }
}
