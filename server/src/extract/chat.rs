use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    rate_limiters::RateLimiters,
    server_config::cfg,
    HttpClient,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: PromptUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
}

/// Sends one chat completion and returns the raw message content. The model
/// is asked for a JSON object but nothing downstream may assume it complied.
pub async fn complete(
    http_client: &HttpClient,
    rate_limiters: &RateLimiters,
    system_prompt: &str,
    user_content: &str,
) -> AppResult<String> {
    rate_limiters.acquire_one().await;

    let resp = http_client
        .post(cfg.api.endpoint.clone())
        .bearer_auth(&cfg.api.key)
        .json(&json!(
          {
            "model": &cfg.model.id,
            "temperature": cfg.model.temperature,
            "messages": [
              {
                "role": "system",
                "content": system_prompt
              },
              {
                "role": "user",
                "content": user_content
              }
            ],
            "response_format": { "type": "json_object" }
          }
        ))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await
        .map_err(|e| {
            if let Some(status) = e.status() {
                match status {
                    StatusCode::BAD_REQUEST => AppError::BadRequest(e.to_string()),
                    StatusCode::REQUEST_TIMEOUT => AppError::RequestTimeout,
                    StatusCode::TOO_MANY_REQUESTS => AppError::TooManyRequests,
                    _ => AppError::Internal(e.into()),
                }
            } else {
                AppError::Internal(e.into())
            }
        })?;

    let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
        .context(format!("Could not parse chat response: {}", resp))?;

    let parsed = match parsed {
        ChatApiResponseOrError::Error(error) => {
            if error.message == "Requests rate limit exceeded" {
                rate_limiters.trigger_backoff();
            }
            return Err(anyhow!("Chat API error: {:?}", error).into());
        }
        ChatApiResponseOrError::Response(parsed) => parsed,
    };

    let choice = parsed.choices.first().context("No choices in response")?;

    Ok(choice.message.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json_str = r#"{
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "{\"has_tasks\": false, \"tasks\": []}"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132}
        }"#;
        let parsed: ChatApiResponseOrError = serde_json::from_str(json_str).unwrap();
        match parsed {
            ChatApiResponseOrError::Response(resp) => {
                assert_eq!(resp.choices.len(), 1);
                assert_eq!(resp.usage.total_tokens, 132);
            }
            ChatApiResponseOrError::Error(_) => panic!("expected a response"),
        }
    }

    #[test]
    fn test_parse_chat_error() {
        let json_str = r#"{"message": "Requests rate limit exceeded"}"#;
        let parsed: ChatApiResponseOrError = serde_json::from_str(json_str).unwrap();
        assert!(matches!(parsed, ChatApiResponseOrError::Error(_)));
    }
}
