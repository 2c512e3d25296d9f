use anyhow::Context;
use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{DateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use regex::Regex;
use serde::Deserialize;

use crate::{error::AppResult, server_config::cfg, HttpClient};

lazy_static::lazy_static!(
    static ref RE_WHITESPACE: Regex = Regex::new(r"[\r\t\n]+").unwrap();
    static ref RE_LONG_SPACE: Regex = Regex::new(r" {2,}").unwrap();
    static ref RE_NON_ASCII: Regex = Regex::new(r"[^\x20-\x7E]").unwrap();
    static ref RE_DIVIDERS: Regex = Regex::new(r"[-=_]{3,}").unwrap();
    static ref RE_HTTP_LINK: Regex = Regex::new(r"https?:\/\/(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)").unwrap();
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessageResponse {
    id: Option<String>,
    raw: Option<String>,
    internal_date: Option<String>,
}

/// A mail message reduced to the fields the extraction pipeline needs, with
/// formatting, links and markup stripped out of the body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    pub id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl ParsedEmail {
    pub fn subject_str(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }

    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    pub fn sender_str(&self) -> &str {
        self.sender.as_deref().unwrap_or("")
    }
}

#[derive(Clone)]
pub struct MailClient {
    http_client: HttpClient,
    access_token: String,
}

impl MailClient {
    pub fn new(http_client: HttpClient, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    /// Lists message ids received since the given instant. The provider's
    /// search granularity is a day, so this over-fetches; the ledger absorbs
    /// the replays.
    pub async fn list_message_ids_since(&self, since: DateTime<Utc>) -> AppResult<Vec<String>> {
        let url = format!("{}/users/me/messages", cfg.google.gmail_endpoint);
        let query = format!("after:{} in:inbox", since.format("%Y/%m/%d"));
        let max_results = cfg.poll.max_messages_per_poll.to_string();

        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("maxResults", max_results.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<MessageListResponse>()
            .await
            .context("Could not parse message list response")?;

        Ok(resp
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    pub async fn fetch_message(&self, id: &str) -> AppResult<ParsedEmail> {
        let url = format!("{}/users/me/messages/{}", cfg.google.gmail_endpoint, id);

        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("format", "raw")])
            .send()
            .await?
            .error_for_status()?
            .json::<RawMessageResponse>()
            .await
            .context("Could not parse raw message response")?;

        let raw = resp
            .raw
            .context(format!("No raw payload in message response for {}", id))?;
        let bytes = decode_base64url(&raw).context("Could not decode raw message payload")?;

        let date = resp
            .internal_date
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(parse_rfc822(
            resp.id.unwrap_or_else(|| id.to_string()),
            &bytes,
            date,
        ))
    }
}

fn decode_base64url(raw: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE
        .decode(raw)
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
}

pub fn parse_rfc822(id: String, bytes: &[u8], date: Option<DateTime<Utc>>) -> ParsedEmail {
    let msg = MessageParser::default().parse(bytes);
    let StrippedMessage {
        sender,
        subject,
        body,
    } = msg.map_or(StrippedMessage::default(), strip_formatting_and_links);

    ParsedEmail {
        id,
        sender,
        subject,
        body,
        date,
    }
}

fn strip_formatting_and_links(msg: mail_parser::Message) -> StrippedMessage {
    let subject = msg.subject().map(|s| s.to_string());
    let body = msg.body_text(0).map(|b| b.to_string());
    let sender = msg
        .from()
        .and_then(|f| f.first().and_then(|x| x.address().map(|a| a.to_string())));

    let subject = subject.map(|s| {
        let s = RE_NON_ASCII.replace_all(&s, "");
        let s = RE_WHITESPACE.replace_all(&s, " ");
        let s = RE_LONG_SPACE.replace_all(&s, " ");
        s.to_string()
    });
    let body = body.map(|b| {
        let b = RE_HTTP_LINK.replace_all(&b, "[LINK]");
        let bytes = b.as_bytes();
        let b: String = html2text::from_read(bytes, 400);
        let b = RE_NON_ASCII.replace_all(&b, "");
        let b = RE_WHITESPACE.replace_all(&b, " ");
        let b = RE_DIVIDERS.replace_all(&b, " ");
        let b = RE_LONG_SPACE.replace_all(&b, " ");
        b.to_string()
    });

    StrippedMessage {
        sender,
        subject,
        body,
    }
}

#[derive(Debug, Default)]
struct StrippedMessage {
    sender: Option<String>,
    subject: Option<String>,
    body: Option<String>,
}
