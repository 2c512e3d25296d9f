use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    server_config::cfg,
    HttpClient,
};

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Exchanges a stored refresh token for a short-lived access token. All three
/// Google connectors go through this before issuing calls.
pub async fn refresh_access_token(
    http_client: &HttpClient,
    refresh_token: &str,
) -> AppResult<String> {
    let params = [
        ("client_id", cfg.google.client_id.as_str()),
        ("client_secret", cfg.google.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    let resp = http_client
        .post(&cfg.google.token_uri)
        .form(&params)
        .send()
        .await?;

    let status = resp.status();
    if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(AppError::Unauthorized(
            "Account access expired or revoked".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(anyhow!("Token refresh failed with status {}", status).into());
    }

    let token = resp
        .json::<TokenResponse>()
        .await
        .context("Could not parse token refresh response")?;

    Ok(token.access_token)
}
