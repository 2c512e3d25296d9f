use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    auth::jwt::Claims,
    db_core::prelude::*,
    error::{AppError, AppJsonResult},
    extract::{normalize::clamp_title, TaskCandidate},
    model::{
        task::{TaskCtrl, TaskFilter, TaskPatch},
        user::UserCtrl,
    },
    pipeline::materializer::{self, TaskProvenance},
    ServerState,
};

use super::{clamp_page_params, Pagination};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksParams {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub source: Option<TaskSource>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<task::Model>,
    pub pagination: Pagination,
}

pub async fn list(
    claims: Claims,
    State(state): State<ServerState>,
    Query(params): Query<ListTasksParams>,
) -> AppJsonResult<TaskListResponse> {
    let (page, per_page) = clamp_page_params(params.page, params.per_page);
    let filter = TaskFilter {
        status: params.status,
        priority: params.priority,
        source: params.source,
    };

    let (tasks, total) =
        TaskCtrl::list_for_owner(&state.conn, &claims.email, &filter, page, per_page).await?;

    Ok(Json(TaskListResponse {
        tasks,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub title: String,
    pub description: String,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<NaiveDate>,
    pub labels: Option<Vec<String>>,
}

pub async fn create(
    claims: Claims,
    State(state): State<ServerState>,
    Json(body): Json<CreateTaskBody>,
) -> AppJsonResult<task::Model> {
    if body.title.trim().is_empty() {
        return Err(AppError::BadRequest("Task title is required".to_string()));
    }
    if body.description.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Task description is required".to_string(),
        ));
    }

    let owner = UserCtrl::get_by_email(&state.conn, &claims.email).await?;

    let candidate = TaskCandidate {
        title: clamp_title(body.title.trim()),
        description: body.description.trim().to_string(),
        priority: body.priority.unwrap_or_default(),
        deadline: body.deadline,
    };

    let mut active_model =
        materializer::task_active_model(&candidate, &owner, &TaskProvenance::Manual);
    if let Some(labels) = body.labels {
        active_model.labels = ActiveValue::Set(entity::task::Labels(labels));
    }

    let task = TaskCtrl::insert(&state.conn, active_model).await?;

    Ok(Json(task))
}

pub async fn get_by_id(
    claims: Claims,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> AppJsonResult<task::Model> {
    let task = TaskCtrl::get_for_owner(&state.conn, id, &claims.email).await?;
    Ok(Json(task))
}

pub async fn update(
    claims: Claims,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(patch): Json<TaskPatch>,
) -> AppJsonResult<task::Model> {
    let task = TaskCtrl::update_for_owner(&state.conn, id, &claims.email, patch).await?;
    Ok(Json(task))
}

pub async fn delete(
    claims: Claims,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> AppJsonResult<serde_json::Value> {
    TaskCtrl::delete_for_owner(&state.conn, id, &claims.email).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
