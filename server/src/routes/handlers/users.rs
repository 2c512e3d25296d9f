use axum::{extract::State, Json};
use serde::Serialize;

use crate::{auth::jwt::Claims, error::AppJsonResult, model::user::UserCtrl, ServerState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub has_mail_connected: bool,
    pub has_calendar_connected: bool,
    pub last_email_check: Option<String>,
    pub last_meeting_check: Option<String>,
}

pub async fn me(claims: Claims, State(state): State<ServerState>) -> AppJsonResult<MeResponse> {
    let user = UserCtrl::get_by_email(&state.conn, &claims.email).await?;

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        picture: user.picture,
        has_mail_connected: user.mail_refresh_token.is_some(),
        has_calendar_connected: user.calendar_tokens.is_some(),
        last_email_check: user.last_email_check.map(|t| t.to_rfc3339()),
        last_meeting_check: user.last_meeting_check.map(|t| t.to_rfc3339()),
    }))
}
