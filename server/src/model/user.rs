use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::{
    db_core::prelude::*,
    error::{is_unique_violation, AppError, AppResult},
};

use entity::user::CalendarTokens;

pub struct UserCtrl;

impl UserCtrl {
    pub async fn create(
        conn: &DatabaseConnection,
        email: &str,
        name: &str,
        google_id: Option<&str>,
    ) -> AppResult<user::Model> {
        let now = chrono::Utc::now().fixed_offset();
        let active_model = user::ActiveModel {
            id: ActiveValue::NotSet,
            email: ActiveValue::Set(email.to_string()),
            name: ActiveValue::Set(name.to_string()),
            google_id: ActiveValue::Set(google_id.map(str::to_string)),
            picture: ActiveValue::Set(None),
            mail_refresh_token: ActiveValue::Set(None),
            calendar_tokens: ActiveValue::Set(None),
            last_email_check: ActiveValue::Set(None),
            last_meeting_check: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let insert_result = User::insert(active_model).exec(conn).await;

        match insert_result {
            Ok(_) => {
                let user = Self::get_by_email(conn, email).await?;
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => Self::get_by_email(conn, email).await,
            Err(e) => Err(e).context("Error creating user")?,
        }
    }

    pub async fn get_by_email(conn: &DatabaseConnection, email: &str) -> AppResult<user::Model> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await
            .context("Error fetching user by email")?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    pub async fn get_by_id(conn: &DatabaseConnection, user_id: i32) -> AppResult<user::Model> {
        let user = User::find_by_id(user_id)
            .one(conn)
            .await
            .context("Error fetching user by id")?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    /// Users the email poller iterates: everyone holding a mail credential.
    pub async fn all_with_mail_access(conn: &DatabaseConnection) -> AppResult<Vec<user::Model>> {
        let users = User::find()
            .filter(user::Column::MailRefreshToken.is_not_null())
            .all(conn)
            .await
            .context("Error fetching users with mail access")?;

        Ok(users)
    }

    /// Users the meeting poller iterates: everyone holding a calendar credential.
    pub async fn all_with_calendar_access(
        conn: &DatabaseConnection,
    ) -> AppResult<Vec<user::Model>> {
        let users = User::find()
            .filter(user::Column::CalendarTokens.is_not_null())
            .all(conn)
            .await
            .context("Error fetching users with calendar access")?;

        Ok(users)
    }

    /// Advances the mail fetch high-water mark. Called once per poll pass,
    /// whether or not new mail was found.
    pub async fn touch_email_checkpoint(
        conn: &DatabaseConnection,
        user_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        User::update(user::ActiveModel {
            id: ActiveValue::Set(user_id),
            last_email_check: ActiveValue::Set(Some(at.fixed_offset())),
            updated_at: ActiveValue::Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        })
        .exec(conn)
        .await
        .context("Error updating email checkpoint")?;

        Ok(())
    }

    pub async fn touch_meeting_checkpoint(
        conn: &DatabaseConnection,
        user_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        User::update(user::ActiveModel {
            id: ActiveValue::Set(user_id),
            last_meeting_check: ActiveValue::Set(Some(at.fixed_offset())),
            updated_at: ActiveValue::Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        })
        .exec(conn)
        .await
        .context("Error updating meeting checkpoint")?;

        Ok(())
    }

    pub async fn set_mail_refresh_token(
        conn: &DatabaseConnection,
        user_id: i32,
        refresh_token: &str,
    ) -> AppResult<()> {
        User::update(user::ActiveModel {
            id: ActiveValue::Set(user_id),
            mail_refresh_token: ActiveValue::Set(Some(refresh_token.to_string())),
            updated_at: ActiveValue::Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        })
        .exec(conn)
        .await
        .context("Error storing mail refresh token")?;

        Ok(())
    }

    pub async fn set_calendar_tokens(
        conn: &DatabaseConnection,
        user_id: i32,
        tokens: CalendarTokens,
    ) -> AppResult<()> {
        User::update(user::ActiveModel {
            id: ActiveValue::Set(user_id),
            calendar_tokens: ActiveValue::Set(Some(tokens)),
            updated_at: ActiveValue::Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        })
        .exec(conn)
        .await
        .context("Error storing calendar tokens")?;

        Ok(())
    }
}
