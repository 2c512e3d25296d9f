use chrono::NaiveDate;
use indoc::formatdoc;

/// System prompt for mail task extraction. `today` anchors relative-deadline
/// resolution ("by Friday", "end of week") to a concrete date.
pub fn email_system_prompt(today: NaiveDate) -> String {
    formatdoc! {r#"
        You are an assistant that extracts actionable work items from emails an employee receives.
        Identify every task, request, deliverable, or action item assigned to the recipient.

        Return ONLY a valid JSON object, no markdown and no explanation:

        {{
          "has_tasks": true or false,
          "tasks": [
            {{
              "title": "Brief task title (max 100 chars)",
              "description": "Complete context of what needs to be done",
              "priority": "low" | "medium" | "high",
              "deadline": "YYYY-MM-DD" | null
            }}
          ]
        }}

        Rules:
        - Extract EVERY separate task, even several in one sentence ("update the report and send it to the team" is 2 tasks).
        - Priority HIGH for "urgent", "ASAP", "critical", "high priority", "immediately", "today"; LOW for "when you can", "nice to have", "optional", "if time permits"; otherwise MEDIUM.
        - Today is {today}. Resolve relative deadlines ("by Friday", "by tomorrow", "end of week") to the next matching calendar date after today, in YYYY-MM-DD format. If several deadlines apply, use the earliest. No deadline mentioned means null.
        - Purely informational mail (FYI, status updates, questions with no action) means {{"has_tasks": false, "tasks": []}}."#,
        today = today.format("%Y-%m-%d"),
    }
}

pub fn email_user_prompt(subject: &str, body: &str) -> String {
    format!(
        r#"Extract any actionable tasks from the following email.
                <subject>{}</subject>
                <body>{}</body>"#,
        subject, body
    )
}

/// System prompt for meeting summarization. Requests the full digest: the
/// narrative summary plus key points, decisions, action items, topics,
/// participants, and a next-meeting hint.
pub fn meeting_system_prompt(today: NaiveDate) -> String {
    formatdoc! {r#"
        You are an assistant analyzing business meeting transcripts. Extract actionable insight,
        decisions, and tasks from the conversation.

        Return ONLY a valid JSON object, no markdown and no explanation:

        {{
          "summary": "2-4 sentence overview of the meeting",
          "key_points": ["Important point or finding"],
          "decisions_made": ["Concrete decision that was finalized"],
          "action_items": [
            {{
              "description": "Clear, specific description of what needs to be done",
              "assigned_to": "Person's name or email if explicitly mentioned, otherwise 'Unassigned' or 'Team'",
              "priority": "low" | "medium" | "high",
              "deadline": "YYYY-MM-DD" | null,
              "context": "Why this task is needed"
            }}
          ],
          "topics_discussed": ["Main topic"],
          "participants_mentioned": ["Person who actively participated"],
          "next_meeting": {{"suggested_date": "YYYY-MM-DD or descriptive text", "topics": ["Topic"]}} or null
        }}

        Rules:
        - Capture EVERY actionable item: follow-ups, documentation, reviews, preparatory work ("I'll look into that" is an action item).
        - Only name an assignee when the transcript names one with the task; otherwise use "Unassigned", or "Team" for group work.
        - Decisions require clear consensus; topics under discussion are not decisions.
        - Today is {today}. Convert relative deadlines to YYYY-MM-DD; null when none is mentioned.
        - Include next_meeting only when one was explicitly discussed.
        - Do not invent information that is not in the transcript."#,
        today = today.format("%Y-%m-%d"),
    }
}

pub fn meeting_user_prompt(meeting_title: &str, attendees: &[String], transcript: &str) -> String {
    format!(
        r#"Analyze this meeting transcript.
                <title>{}</title>
                <attendees>{}</attendees>
                <transcript>{}</transcript>"#,
        meeting_title,
        attendees.join(", "),
        transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    #[test]
    fn test_email_system_prompt() {
        let prompt = email_system_prompt(fixture_today());
        assert!(prompt.contains("has_tasks"));
        assert!(prompt.contains("priority"));
        assert!(prompt.contains("deadline"));
        assert!(prompt.contains("Today is 2025-11-20"));
    }

    #[test]
    fn test_meeting_system_prompt() {
        let prompt = meeting_system_prompt(fixture_today());
        assert!(prompt.contains("action_items"));
        assert!(prompt.contains("assigned_to"));
        assert!(prompt.contains("Unassigned"));
        assert!(prompt.contains("next_meeting"));
        assert!(prompt.contains("Today is 2025-11-20"));
    }

    #[test]
    fn test_meeting_user_prompt_joins_attendees() {
        let prompt = meeting_user_prompt(
            "Standup",
            &["ana@example.com".to_string(), "bo@example.com".to_string()],
            "hello",
        );
        assert!(prompt.contains("ana@example.com, bo@example.com"));
    }
}
