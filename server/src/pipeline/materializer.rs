use chrono::Utc;

use crate::{db_core::prelude::*, extract::TaskCandidate, model::task::TaskCtrl};

use entity::task::Labels;

/// Origin metadata stamped onto every created task.
#[derive(Debug, Clone)]
pub enum TaskProvenance {
    Manual,
    Email {
        email_id: String,
        sender_email: String,
    },
    Meeting {
        meeting_id: i32,
        meeting_title: String,
        meeting_date: DateTimeWithTimeZone,
    },
}

impl TaskProvenance {
    fn source(&self) -> TaskSource {
        match self {
            TaskProvenance::Manual => TaskSource::Manual,
            TaskProvenance::Email { .. } => TaskSource::Email,
            TaskProvenance::Meeting { .. } => TaskSource::Meeting,
        }
    }
}

/// Builds the row for one validated candidate. Every task carries
/// owner_email so ownership queries stay correct even if assigned_to is
/// later shared or reassigned.
pub fn task_active_model(
    candidate: &TaskCandidate,
    owner: &user::Model,
    provenance: &TaskProvenance,
) -> task::ActiveModel {
    let now = Utc::now().fixed_offset();

    let mut active_model = task::ActiveModel {
        id: ActiveValue::NotSet,
        title: ActiveValue::Set(candidate.title.clone()),
        description: ActiveValue::Set(candidate.description.clone()),
        priority: ActiveValue::Set(candidate.priority),
        status: ActiveValue::Set(TaskStatus::Pending),
        deadline: ActiveValue::Set(candidate.deadline),
        assigned_to: ActiveValue::Set(owner.id),
        created_by: ActiveValue::Set(owner.id),
        owner_email: ActiveValue::Set(owner.email.clone()),
        source: ActiveValue::Set(provenance.source()),
        email_id: ActiveValue::Set(None),
        sender_email: ActiveValue::Set(None),
        meeting_id: ActiveValue::Set(None),
        meeting_title: ActiveValue::Set(None),
        meeting_date: ActiveValue::Set(None),
        labels: ActiveValue::Set(Labels::default()),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
    };

    match provenance {
        TaskProvenance::Manual => {}
        TaskProvenance::Email {
            email_id,
            sender_email,
        } => {
            active_model.email_id = ActiveValue::Set(Some(email_id.clone()));
            active_model.sender_email = ActiveValue::Set(Some(sender_email.clone()));
        }
        TaskProvenance::Meeting {
            meeting_id,
            meeting_title,
            meeting_date,
        } => {
            active_model.meeting_id = ActiveValue::Set(Some(*meeting_id));
            active_model.meeting_title = ActiveValue::Set(Some(meeting_title.clone()));
            active_model.meeting_date = ActiveValue::Set(Some(*meeting_date));
        }
    }

    active_model
}

/// Creates one task per candidate. Failures are per-item: a candidate that
/// cannot be inserted is logged and skipped, the rest still materialize. For
/// meeting provenance the created task id is written back into the summary's
/// action item at the same position, best-effort.
pub async fn create_tasks(
    conn: &DatabaseConnection,
    candidates: &[TaskCandidate],
    owner: &user::Model,
    provenance: &TaskProvenance,
) -> usize {
    let mut created_count = 0;

    for (index, candidate) in candidates.iter().enumerate() {
        let active_model = task_active_model(candidate, owner, provenance);

        let task = match TaskCtrl::insert(conn, active_model).await {
            Ok(task) => task,
            Err(e) => {
                tracing::error!("Failed to create task '{}': {:?}", candidate.title, e);
                continue;
            }
        };

        created_count += 1;
        tracing::info!("Created task {} '{}'", task.id, task.title);

        if let TaskProvenance::Meeting { meeting_id, .. } = provenance {
            if let Err(e) = crate::model::meeting_summary::MeetingSummaryCtrl::set_action_item_task_id(
                conn, *meeting_id, index, task.id,
            )
            .await
            {
                tracing::warn!(
                    "Task {} created but summary back-reference for meeting {} item {} failed: {:?}",
                    task.id,
                    meeting_id,
                    index,
                    e
                );
            }
        }
    }

    created_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn owner_fixture() -> user::Model {
        let now = Utc::now().fixed_offset();
        user::Model {
            id: 7,
            email: "owner@example.com".to_string(),
            name: "Owner".to_string(),
            google_id: None,
            picture: None,
            mail_refresh_token: None,
            calendar_tokens: None,
            last_email_check: None,
            last_meeting_check: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn candidate_fixture() -> TaskCandidate {
        TaskCandidate {
            title: "Send the report".to_string(),
            description: "Send the weekly report".to_string(),
            priority: TaskPriority::High,
            deadline: NaiveDate::from_ymd_opt(2025, 11, 21),
        }
    }

    #[test]
    fn test_email_provenance_fields() {
        let provenance = TaskProvenance::Email {
            email_id: "msg_1".to_string(),
            sender_email: "boss@example.com".to_string(),
        };
        let model = task_active_model(&candidate_fixture(), &owner_fixture(), &provenance);

        assert_eq!(model.owner_email.as_ref(), "owner@example.com");
        assert_eq!(model.source.as_ref(), &TaskSource::Email);
        assert_eq!(model.email_id.as_ref(), &Some("msg_1".to_string()));
        assert_eq!(
            model.sender_email.as_ref(),
            &Some("boss@example.com".to_string())
        );
        assert_eq!(model.meeting_id.as_ref(), &None);
        assert_eq!(model.status.as_ref(), &TaskStatus::Pending);
    }

    #[test]
    fn test_meeting_provenance_fields() {
        let meeting_date = Utc::now().fixed_offset();
        let provenance = TaskProvenance::Meeting {
            meeting_id: 42,
            meeting_title: "Sprint Planning".to_string(),
            meeting_date,
        };
        let model = task_active_model(&candidate_fixture(), &owner_fixture(), &provenance);

        assert_eq!(model.source.as_ref(), &TaskSource::Meeting);
        assert_eq!(model.meeting_id.as_ref(), &Some(42));
        assert_eq!(
            model.meeting_title.as_ref(),
            &Some("Sprint Planning".to_string())
        );
        assert_eq!(model.email_id.as_ref(), &None);
        // meeting tasks are assigned to the meeting owner
        assert_eq!(model.assigned_to.as_ref(), &7);
    }

    #[test]
    fn test_manual_provenance_has_no_source_fields() {
        let model =
            task_active_model(&candidate_fixture(), &owner_fixture(), &TaskProvenance::Manual);

        assert_eq!(model.source.as_ref(), &TaskSource::Manual);
        assert_eq!(model.email_id.as_ref(), &None);
        assert_eq!(model.meeting_id.as_ref(), &None);
        assert_eq!(
            model.deadline.as_ref(),
            &NaiveDate::from_ymd_opt(2025, 11, 21)
        );
    }
}
