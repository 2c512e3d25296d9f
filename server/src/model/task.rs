use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    db_core::prelude::*,
    error::{AppError, AppResult},
};

use entity::task::Labels;

pub struct TaskCtrl;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub source: Option<TaskSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<Option<NaiveDate>>,
    pub labels: Option<Vec<String>>,
}

impl TaskCtrl {
    pub async fn insert(
        conn: &DatabaseConnection,
        active_model: task::ActiveModel,
    ) -> Result<task::Model, DbErr> {
        active_model.insert(conn).await
    }

    /// Fetches a task only when it belongs to the given owner. Ownership is
    /// decided by the denormalized owner_email column.
    pub async fn get_for_owner(
        conn: &DatabaseConnection,
        task_id: i32,
        owner_email: &str,
    ) -> AppResult<task::Model> {
        let task = Task::find_by_id(task_id)
            .filter(task::Column::OwnerEmail.eq(owner_email))
            .one(conn)
            .await
            .context("Error fetching task")?
            .ok_or(AppError::NotFound("Task not found".to_string()))?;

        Ok(task)
    }

    pub async fn list_for_owner(
        conn: &DatabaseConnection,
        owner_email: &str,
        filter: &TaskFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<task::Model>, u64)> {
        let mut query = Task::find().filter(task::Column::OwnerEmail.eq(owner_email));

        if let Some(status) = filter.status {
            query = query.filter(task::Column::Status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(task::Column::Priority.eq(priority));
        }
        if let Some(source) = filter.source {
            query = query.filter(task::Column::Source.eq(source));
        }

        let paginator = query
            .order_by_desc(task::Column::CreatedAt)
            .paginate(conn, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Error counting tasks")?;
        let tasks = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Error fetching task page")?;

        Ok((tasks, total))
    }

    pub async fn update_for_owner(
        conn: &DatabaseConnection,
        task_id: i32,
        owner_email: &str,
        patch: TaskPatch,
    ) -> AppResult<task::Model> {
        let existing = Self::get_for_owner(conn, task_id, owner_email).await?;

        let mut active_model: task::ActiveModel = existing.into();
        if let Some(title) = patch.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(description) = patch.description {
            active_model.description = ActiveValue::Set(description);
        }
        if let Some(status) = patch.status {
            active_model.status = ActiveValue::Set(status);
        }
        if let Some(priority) = patch.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        if let Some(deadline) = patch.deadline {
            active_model.deadline = ActiveValue::Set(deadline);
        }
        if let Some(labels) = patch.labels {
            active_model.labels = ActiveValue::Set(Labels(labels));
        }
        active_model.updated_at = ActiveValue::Set(chrono::Utc::now().fixed_offset());

        let updated = active_model
            .update(conn)
            .await
            .context("Error updating task")?;

        Ok(updated)
    }

    pub async fn delete_for_owner(
        conn: &DatabaseConnection,
        task_id: i32,
        owner_email: &str,
    ) -> AppResult<()> {
        let existing = Self::get_for_owner(conn, task_id, owner_email).await?;

        Task::delete_by_id(existing.id)
            .exec(conn)
            .await
            .context("Error deleting task")?;

        Ok(())
    }
}
