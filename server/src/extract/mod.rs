pub mod chat;
pub mod normalize;
pub mod prompts;

use chrono::Utc;

use crate::{error::AppResult, rate_limiters::RateLimiters, HttpClient};

pub use normalize::{MeetingDigest, TaskCandidate};

/// Runs a mail message through the model and returns the validated task
/// candidates. A response the model mangles counts as "no tasks found", not
/// an error; transport failures propagate so the item is retried next tick.
pub async fn extract_email_tasks(
    http_client: &HttpClient,
    rate_limiters: &RateLimiters,
    subject: &str,
    body: &str,
) -> AppResult<Vec<TaskCandidate>> {
    let today = Utc::now().date_naive();
    let raw = chat::complete(
        http_client,
        rate_limiters,
        &prompts::email_system_prompt(today),
        &prompts::email_user_prompt(subject, body),
    )
    .await?;

    Ok(normalize::parse_task_extraction(&raw))
}

/// Summarizes a meeting transcript into a structured digest. Unlike the mail
/// path, an unusable response is an error here: the caller records the
/// meeting as failed rather than silently completing with nothing.
pub async fn summarize_meeting(
    http_client: &HttpClient,
    rate_limiters: &RateLimiters,
    meeting_title: &str,
    attendees: &[String],
    transcript: &str,
) -> AppResult<MeetingDigest> {
    let today = Utc::now().date_naive();
    let raw = chat::complete(
        http_client,
        rate_limiters,
        &prompts::meeting_system_prompt(today),
        &prompts::meeting_user_prompt(meeting_title, attendees, transcript),
    )
    .await?;

    normalize::parse_meeting_digest(&raw).map_err(Into::into)
}
