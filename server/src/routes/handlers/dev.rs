use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::jwt::generate_dev_token,
    db_core::prelude::*,
    error::AppJsonResult,
    model::user::UserCtrl,
    ServerState,
};

use entity::user::CalendarTokens;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevTokenParams {
    #[serde(default = "default_user_id")]
    pub user_id: i32,
    #[serde(default = "default_email")]
    pub email: String,
}

fn default_user_id() -> i32 {
    1
}

fn default_email() -> String {
    "test@example.com".to_string()
}

#[derive(Serialize)]
struct DevTokenResponse {
    token: String,
}

pub async fn dev_token(Query(params): Query<DevTokenParams>) -> impl IntoResponse {
    match generate_dev_token(params.user_id, &params.email) {
        Ok(token) => (StatusCode::OK, Json(DevTokenResponse { token })).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token").into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
}

pub async fn create_user(
    State(state): State<ServerState>,
    Json(body): Json<CreateUserBody>,
) -> AppJsonResult<user::Model> {
    let user =
        UserCtrl::create(&state.conn, &body.email, &body.name, body.google_id.as_deref()).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCredentialsBody {
    pub mail_refresh_token: Option<String>,
    pub calendar_refresh_token: Option<String>,
}

pub async fn set_credentials(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(body): Json<SetCredentialsBody>,
) -> AppJsonResult<user::Model> {
    if let Some(token) = body.mail_refresh_token {
        UserCtrl::set_mail_refresh_token(&state.conn, id, &token).await?;
    }
    if let Some(refresh_token) = body.calendar_refresh_token {
        UserCtrl::set_calendar_tokens(
            &state.conn,
            id,
            CalendarTokens {
                access_token: None,
                refresh_token,
            },
        )
        .await?;
    }

    let user = UserCtrl::get_by_id(&state.conn, id).await?;
    Ok(Json(user))
}
