use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::{error::AppResult, server_config::cfg, HttpClient};

const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";
const NOTES_MARKER: &str = "Notes by Gemini";
const TRANSCRIPT_MARKER: &str = "Transcript";

lazy_static::lazy_static!(
    static ref RE_NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();
);

#[derive(Debug, Deserialize)]
struct FilesResponse {
    files: Option<Vec<DriveFile>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub created_time: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DriveClient {
    http_client: HttpClient,
    access_token: String,
}

impl DriveClient {
    pub fn new(http_client: HttpClient, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    /// Searches for the transcript or notes document produced for a meeting,
    /// by title keywords within a window around the meeting start. Falls back
    /// to a window-only search when the title-filtered query finds nothing.
    pub async fn find_meeting_document(
        &self,
        meeting_title: &str,
        start_time: DateTime<FixedOffset>,
    ) -> AppResult<Option<DriveFile>> {
        // Documents appear near the meeting time; meetings can run long.
        let window_start = start_time - Duration::hours(2);
        let window_end = start_time + Duration::hours(4);

        let base_query = format!(
            "mimeType = '{}' and (name contains '{}' or name contains '{}') \
             and createdTime >= '{}' and createdTime <= '{}'",
            DOCUMENT_MIME_TYPE,
            TRANSCRIPT_MARKER,
            NOTES_MARKER,
            window_start.to_rfc3339(),
            window_end.to_rfc3339(),
        );

        let title_clause = title_keyword_clause(meeting_title);
        let query = match &title_clause {
            Some(clause) => format!("{} and ({})", base_query, clause),
            None => base_query.clone(),
        };

        let mut files = self.list_files(&query).await?;

        if files.is_empty() && title_clause.is_some() {
            tracing::info!(
                "No document matched the title filter for '{}', widening search",
                meeting_title
            );
            files = self.list_files(&base_query).await?;
        }

        Ok(pick_preferred_document(files))
    }

    async fn list_files(&self, query: &str) -> AppResult<Vec<DriveFile>> {
        let url = format!("{}/files", cfg.google.drive_endpoint);

        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query),
                ("pageSize", "20"),
                ("fields", "files(id, name, createdTime)"),
                ("orderBy", "createdTime desc"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<FilesResponse>()
            .await
            .context("Could not parse file list response")?;

        Ok(resp.files.unwrap_or_default())
    }

    /// Plain-text export of a document. Returns None when the export comes
    /// back empty.
    pub async fn document_text(&self, file_id: &str) -> AppResult<Option<String>> {
        let url = format!("{}/files/{}/export", cfg.google.drive_endpoint, file_id);

        let text = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("mimeType", "text/plain")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .context("Could not read document export body")?;

        if text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(text))
    }
}

fn title_keyword_clause(meeting_title: &str) -> Option<String> {
    let cleaned = RE_NON_WORD.replace_all(meeting_title, "");
    let words: Vec<&str> = cleaned.split_whitespace().take(3).collect();

    if words.is_empty() {
        return None;
    }

    Some(
        words
            .iter()
            .map(|w| format!("name contains '{}'", w))
            .collect::<Vec<_>>()
            .join(" or "),
    )
}

/// Structured notes documents are richer than raw transcripts; prefer them
/// when both exist for the same window.
pub fn pick_preferred_document(files: Vec<DriveFile>) -> Option<DriveFile> {
    let (notes, rest): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|f| f.name.contains(NOTES_MARKER));

    if let Some(best) = notes.into_iter().next() {
        return Some(best);
    }

    rest.into_iter().find(|f| f.name.contains(TRANSCRIPT_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, name: &str) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            created_time: None,
        }
    }

    #[test]
    fn test_notes_preferred_over_transcript() {
        let files = vec![
            file("t1", "Sprint Planning - Transcript"),
            file("n1", "Sprint Planning - Notes by Gemini"),
        ];
        let best = pick_preferred_document(files).unwrap();
        assert_eq!(best.id, "n1");
    }

    #[test]
    fn test_transcript_used_when_no_notes() {
        let files = vec![file("t1", "Sprint Planning - Transcript")];
        let best = pick_preferred_document(files).unwrap();
        assert_eq!(best.id, "t1");
    }

    #[test]
    fn test_unrelated_documents_ignored() {
        let files = vec![file("d1", "Quarterly budget")];
        assert!(pick_preferred_document(files).is_none());
    }

    #[test]
    fn test_title_keyword_clause_first_three_words() {
        let clause = title_keyword_clause("Q4 Roadmap: Review & Planning").unwrap();
        assert_eq!(
            clause,
            "name contains 'Q4' or name contains 'Roadmap' or name contains 'Review'"
        );
    }

    #[test]
    fn test_title_keyword_clause_empty_title() {
        assert!(title_keyword_clause("!!!").is_none());
    }
}
