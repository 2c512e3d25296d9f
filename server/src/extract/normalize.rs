use anyhow::Context;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use entity::{
    meeting_summary::{ActionItem, NextMeeting},
    sea_orm_active_enums::TaskPriority,
};

lazy_static::lazy_static!(
    static ref RE_FENCE_OPEN: Regex = Regex::new(r"^```(?:json)?\s*").unwrap();
    static ref RE_FENCE_CLOSE: Regex = Regex::new(r"\s*```$").unwrap();
);

/// A validated task proposal. Anything that reaches the materializer has a
/// non-empty title and description, a real priority, and a real date or none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCandidate {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    has_tasks: bool,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    deadline: Option<String>,
}

/// Coerces a mail-extraction response into validated candidates. The model is
/// not contract-bound to return bare JSON, so fence wrapping is stripped
/// first; anything that still fails to parse counts as "no tasks found".
pub fn parse_task_extraction(raw: &str) -> Vec<TaskCandidate> {
    let cleaned = strip_code_fences(raw);

    let parsed = match serde_json::from_str::<RawExtraction>(&cleaned) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Could not parse task extraction response: {:?}", e);
            return Vec::new();
        }
    };

    if !parsed.has_tasks {
        return Vec::new();
    }

    parsed.tasks.iter().filter_map(validate_candidate).collect()
}

fn validate_candidate(task: &RawTask) -> Option<TaskCandidate> {
    let title = task
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    let description = task
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())?;

    Some(TaskCandidate {
        title: clamp_title(title),
        description: description.to_string(),
        priority: clamp_priority(task.priority.as_deref()),
        deadline: parse_deadline(task.deadline.as_deref()),
    })
}

/// Structured output of a meeting summarization, validated and ready to
/// persist. Action items here are exactly the list the summary stores, so
/// task back-references index into it safely.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingDigest {
    pub summary: String,
    pub key_points: Vec<String>,
    pub decisions_made: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub topics_discussed: Vec<String>,
    pub participants_mentioned: Vec<String>,
    pub next_meeting: Option<NextMeeting>,
}

#[derive(Debug, Deserialize)]
struct RawDigest {
    summary: Option<String>,
    key_points: Option<Vec<String>>,
    #[serde(default)]
    decisions_made: Vec<String>,
    action_items: Option<Vec<RawActionItem>>,
    #[serde(default)]
    topics_discussed: Vec<String>,
    #[serde(default)]
    participants_mentioned: Vec<String>,
    next_meeting: Option<RawNextMeeting>,
}

#[derive(Debug, Deserialize)]
struct RawActionItem {
    description: Option<String>,
    assigned_to: Option<String>,
    priority: Option<String>,
    deadline: Option<String>,
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNextMeeting {
    suggested_date: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

/// Coerces a meeting-summary response into a digest. Unlike mail extraction,
/// a response missing the required fields is an error: the meeting is failed
/// and can be retried, instead of being silently summarized as nothing.
pub fn parse_meeting_digest(raw: &str) -> anyhow::Result<MeetingDigest> {
    let cleaned = strip_code_fences(raw);

    let parsed = serde_json::from_str::<RawDigest>(&cleaned)
        .context("Meeting summary response was not valid JSON")?;

    let summary = parsed
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .context("Meeting summary response missing 'summary'")?;
    let key_points = parsed
        .key_points
        .context("Meeting summary response missing 'key_points'")?;
    let raw_items = parsed
        .action_items
        .context("Meeting summary response missing 'action_items'")?;

    let action_items = raw_items.iter().filter_map(validate_action_item).collect();

    let next_meeting = parsed.next_meeting.map(|n| NextMeeting {
        suggested_date: n.suggested_date,
        topics: n.topics,
    });

    Ok(MeetingDigest {
        summary,
        key_points,
        decisions_made: parsed.decisions_made,
        action_items,
        topics_discussed: parsed.topics_discussed,
        participants_mentioned: parsed.participants_mentioned,
        next_meeting,
    })
}

fn validate_action_item(item: &RawActionItem) -> Option<ActionItem> {
    let description = item
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())?;

    Some(ActionItem {
        description: description.to_string(),
        assigned_to: item
            .assigned_to
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("Unassigned")
            .to_string(),
        priority: clamp_priority(item.priority.as_deref()),
        deadline: parse_deadline(item.deadline.as_deref()),
        context: item
            .context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        task_id: None,
    })
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = RE_FENCE_OPEN.replace(trimmed, "");
    let without_close = RE_FENCE_CLOSE.replace(&without_open, "");
    without_close.trim().to_string()
}

pub fn clamp_priority(raw: Option<&str>) -> TaskPriority {
    match raw {
        Some("low") => TaskPriority::Low,
        Some("high") => TaskPriority::High,
        _ => TaskPriority::Medium,
    }
}

fn parse_deadline(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

pub fn clamp_title(title: &str) -> String {
    title.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tasks_bare_json() {
        let raw = r#"{"has_tasks": true, "tasks": [{"title": "Review document", "description": "Review the Q4 report", "priority": "high", "deadline": "2025-11-21"}]}"#;
        let candidates = parse_task_extraction(raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Review document");
        assert_eq!(candidates[0].priority, TaskPriority::High);
        assert_eq!(
            candidates[0].deadline,
            Some(NaiveDate::from_ymd_opt(2025, 11, 21).unwrap())
        );
    }

    #[test]
    fn test_parse_tasks_fenced_json() {
        let raw = "```json\n{\"has_tasks\": true, \"tasks\": [{\"title\": \"T\", \"description\": \"D\"}]}\n```";
        let bare = r#"{"has_tasks": true, "tasks": [{"title": "T", "description": "D"}]}"#;
        assert_eq!(parse_task_extraction(raw), parse_task_extraction(bare));
        assert_eq!(parse_task_extraction(raw).len(), 1);
    }

    #[test]
    fn test_parse_tasks_invalid_json_is_empty() {
        assert!(parse_task_extraction("the model went off-script").is_empty());
        assert!(parse_task_extraction("[1, 2, 3]").is_empty());
        assert!(parse_task_extraction("").is_empty());
    }

    #[test]
    fn test_parse_tasks_has_tasks_false() {
        let raw = r#"{"has_tasks": false, "tasks": []}"#;
        assert!(parse_task_extraction(raw).is_empty());
    }

    #[test]
    fn test_candidate_missing_title_or_description_dropped() {
        let raw = r#"{"has_tasks": true, "tasks": [
            {"title": "", "description": "no title"},
            {"title": "no description"},
            {"title": "Kept", "description": "complete"}
        ]}"#;
        let candidates = parse_task_extraction(raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Kept");
    }

    #[test]
    fn test_invalid_priority_clamped_to_medium() {
        let raw = r#"{"has_tasks": true, "tasks": [
            {"title": "A", "description": "d", "priority": "URGENT"},
            {"title": "B", "description": "d"}
        ]}"#;
        let candidates = parse_task_extraction(raw);
        assert!(candidates
            .iter()
            .all(|c| c.priority == TaskPriority::Medium));
    }

    #[test]
    fn test_unparseable_deadline_becomes_none() {
        let raw = r#"{"has_tasks": true, "tasks": [
            {"title": "A", "description": "d", "deadline": "by Friday"},
            {"title": "B", "description": "d", "deadline": "2025-13-45"}
        ]}"#;
        let candidates = parse_task_extraction(raw);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.deadline.is_none()));
    }

    #[test]
    fn test_title_clamped_to_100_chars() {
        let long_title = "x".repeat(140);
        let raw = format!(
            r#"{{"has_tasks": true, "tasks": [{{"title": "{}", "description": "d"}}]}}"#,
            long_title
        );
        let candidates = parse_task_extraction(&raw);
        assert_eq!(candidates[0].title.chars().count(), 100);
    }

    // Expected model output for "Please send the report and update the
    // dashboard by Friday, high priority", with today pinned to 2025-11-20.
    #[test]
    fn test_report_and_dashboard_scenario() {
        let raw = r#"{"has_tasks": true, "tasks": [
            {"title": "Send the report", "description": "Send the report as requested, due by Friday", "priority": "high", "deadline": "2025-11-21"},
            {"title": "Update the dashboard", "description": "Update the dashboard, due by Friday", "priority": "high", "deadline": "2025-11-21"}
        ]}"#;
        let candidates = parse_task_extraction(raw);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.priority == TaskPriority::High));
        let friday = NaiveDate::from_ymd_opt(2025, 11, 21).unwrap();
        assert!(candidates.iter().any(|c| c.deadline == Some(friday)));
    }

    fn digest_fixture() -> &'static str {
        r#"{
            "summary": "Team aligned on the release plan and follow-ups.",
            "key_points": ["Release candidate is ready", "Docs are behind"],
            "decisions_made": ["Ship on Tuesday"],
            "action_items": [
                {"description": "Update API documentation", "assigned_to": "Sarah", "priority": "medium", "deadline": "2025-11-22", "context": "Needed before release"},
                {"description": "Finalize API design", "assigned_to": "Team", "priority": "badvalue", "deadline": "next week"}
            ],
            "topics_discussed": ["Release", "Docs"],
            "participants_mentioned": ["John", "Sarah"],
            "next_meeting": {"suggested_date": "2025-11-25", "topics": ["Review progress"]}
        }"#
    }

    #[test]
    fn test_parse_meeting_digest() {
        let digest = parse_meeting_digest(digest_fixture()).unwrap();
        assert_eq!(digest.key_points.len(), 2);
        assert_eq!(digest.action_items.len(), 2);
        assert_eq!(digest.action_items[0].assigned_to, "Sarah");
        assert_eq!(
            digest.action_items[0].deadline,
            Some(NaiveDate::from_ymd_opt(2025, 11, 22).unwrap())
        );
        // invalid priority and relative deadline on the second item
        assert_eq!(digest.action_items[1].priority, TaskPriority::Medium);
        assert_eq!(digest.action_items[1].deadline, None);
        assert!(digest.action_items.iter().all(|i| i.task_id.is_none()));
        assert_eq!(
            digest.next_meeting.as_ref().unwrap().suggested_date.as_deref(),
            Some("2025-11-25")
        );
    }

    #[test]
    fn test_meeting_digest_fenced() {
        let fenced = format!("```json\n{}\n```", digest_fixture());
        let digest = parse_meeting_digest(&fenced).unwrap();
        assert_eq!(digest.action_items.len(), 2);
    }

    #[test]
    fn test_meeting_digest_missing_summary_is_error() {
        let raw = r#"{"key_points": [], "action_items": []}"#;
        assert!(parse_meeting_digest(raw).is_err());
    }

    #[test]
    fn test_meeting_digest_invalid_json_is_error() {
        assert!(parse_meeting_digest("not json at all").is_err());
    }

    #[test]
    fn test_action_item_without_description_dropped() {
        let raw = r#"{
            "summary": "s",
            "key_points": [],
            "action_items": [
                {"assigned_to": "Sarah", "priority": "high"},
                {"description": "  ", "assigned_to": "Team"},
                {"description": "Kept"}
            ]
        }"#;
        let digest = parse_meeting_digest(raw).unwrap();
        assert_eq!(digest.action_items.len(), 1);
        assert_eq!(digest.action_items[0].description, "Kept");
        assert_eq!(digest.action_items[0].assigned_to, "Unassigned");
    }
}
