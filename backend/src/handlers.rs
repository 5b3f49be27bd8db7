//! HTTP request handlers for the task API.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tempo_shared::{
    category, parse_date, CreateTaskRequest, ParseRequest, ParsedTask, Task, TaskResponse,
    UpdateTaskRequest,
};
use tracing::info;
use uuid::Uuid;

use crate::{auth::CurrentUser, error::ApiError, store::TaskStore, AppState};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses an optional `YYYY-MM-DD` string, falling back to today.
fn date_or_today(raw: Option<&str>) -> NaiveDate {
    raw.and_then(parse_date).unwrap_or_else(today)
}

pub async fn health_check<S: TaskStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ai_enabled": state.parser.is_enabled(),
        "dev_mode": state.config.dev_mode,
    }))
}

pub async fn list_categories(_user: CurrentUser) -> Json<Value> {
    let registry: Map<String, Value> = category::all()
        .map(|(key, info)| (key.as_str().to_string(), json!(info)))
        .collect();
    Json(Value::Object(registry))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
}

pub async fn list_tasks<S: TaskStore>(
    State(state): State<AppState<S>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let date = date_or_today(query.date.as_deref());
    let tasks = state.store.list_tasks(user_id, date).await?;
    Ok(Json(tasks.iter().map(TaskResponse::from).collect()))
}

pub async fn parse_task<S: TaskStore>(
    State(state): State<AppState<S>>,
    _user: CurrentUser,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<ParsedTask>, ApiError> {
    let Json(payload) = payload?;
    if payload.input.trim().is_empty() {
        return Err(ApiError::BadRequest("input must not be empty".to_string()));
    }
    let reference_date = date_or_today(payload.reference_date.as_deref());
    let parsed = state.parser.parse(&payload.input, reference_date).await;
    Ok(Json(parsed))
}

pub async fn create_task<S: TaskStore>(
    State(state): State<AppState<S>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let Json(payload) = payload?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    let task = state
        .store
        .create_task(Task::new(user_id, payload, today()))
        .await?;
    info!("Created task {} for user {}", task.id, user_id);
    Ok((StatusCode::CREATED, Json(TaskResponse::from(&task))))
}

pub async fn update_task<S: TaskStore>(
    State(state): State<AppState<S>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, ApiError> {
    let Json(payload) = payload?;
    let mut task = state
        .store
        .get_task(user_id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    task.apply(payload, today());
    state.store.save_task(&task).await?;
    Ok(Json(TaskResponse::from(&task)))
}

pub async fn delete_task<S: TaskStore>(
    State(state): State<AppState<S>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if state.store.delete_task(user_id, id).await? {
        info!("Deleted task {} for user {}", id, user_id);
        Ok(Json(json!({ "message": "Task deleted" })))
    } else {
        Err(ApiError::NotFound)
    }
}

pub async fn toggle_task<S: TaskStore>(
    State(state): State<AppState<S>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, ApiError> {
    let mut task = state
        .store
        .get_task(user_id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    task.toggle();
    state.store.save_task(&task).await?;
    Ok(Json(TaskResponse::from(&task)))
}
