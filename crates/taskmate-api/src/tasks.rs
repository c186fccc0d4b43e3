use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use taskmate_db::Database;
use taskmate_db::models::{TaskFields, TaskRow};
use taskmate_types::api::{Claims, CreateTaskRequest, TaskQuery, TaskResponse, UpdateTaskRequest};
use taskmate_types::models::{Priority, Task, TaskStatus};

use crate::auth::{AppState, internal};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 100;

/// Run a blocking DB call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(internal)
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let owner = claims.sub.to_string();
    let rows = with_db(&state, move |db| db.list_tasks(&owner, &query)).await?;

    let tasks: Vec<TaskResponse> = rows.into_iter().map(|row| task_from_row(row).into()).collect();
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = validate_title(&req.title)?;
    let description = validate_description(req.description)?;

    let task_id = Uuid::new_v4();
    let owner = claims.sub.to_string();
    let due_date = date_key(req.due_date);

    let row = with_db(&state, move |db| {
        db.insert_task(
            &task_id.to_string(),
            &owner,
            &TaskFields {
                title: &title,
                description: description.as_deref(),
                due_date: &due_date,
                status: req.status.as_str(),
                priority: req.priority.as_str(),
            },
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task_from_row(row)))))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let owner = claims.sub.to_string();
    let row = with_db(&state, move |db| db.get_task(&owner, &task_id.to_string()))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(TaskResponse::from(task_from_row(row))))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.as_deref().map(validate_title).transpose()?;
    let description = req.description.map(validate_description).transpose()?;
    let owner = claims.sub.to_string();
    let id = task_id.to_string();

    let row = with_db(&state, move |db| {
        let Some(current) = db.get_task(&owner, &id)? else {
            return Ok(None);
        };

        let title = title.unwrap_or(current.title);
        let description = description.unwrap_or(current.description);
        let due_date = req.due_date.map(date_key).unwrap_or(current.due_date);
        let status = req.status.map(|s| s.as_str().to_string()).unwrap_or(current.status);
        let priority = req.priority.map(|p| p.as_str().to_string()).unwrap_or(current.priority);

        let fields = TaskFields {
            title: &title,
            description: description.as_deref(),
            due_date: &due_date,
            status: &status,
            priority: &priority,
        };
        if !db.update_task(&owner, &id, &fields)? {
            return Ok(None);
        }
        db.get_task(&owner, &id)
    })
    .await?
    .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(TaskResponse::from(task_from_row(row))))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let owner = claims.sub.to_string();
    let deleted = with_db(&state, move |db| db.delete_task(&owner, &task_id.to_string())).await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

fn validate_title(title: &str) -> Result<String, StatusCode> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(title.to_string())
}

/// Blank descriptions are stored as NULL.
fn validate_description(description: Option<String>) -> Result<Option<String>, StatusCode> {
    match description.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(d) if d.chars().count() > MAX_DESCRIPTION_CHARS => Err(StatusCode::BAD_REQUEST),
        Some(d) => Ok(Some(d.to_string())),
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

pub(crate) fn task_from_row(row: TaskRow) -> Task {
    Task {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt task id '{}': {}", row.id, e);
            Uuid::default()
        }),
        owner_id: row.owner_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt owner_id '{}' on task '{}': {}", row.owner_id, row.id, e);
            Uuid::default()
        }),
        due_date: NaiveDate::parse_from_str(&row.due_date, "%Y-%m-%d").unwrap_or_else(|e| {
            warn!("Corrupt due_date '{}' on task '{}': {}", row.due_date, row.id, e);
            NaiveDate::default()
        }),
        status: row.status.parse().unwrap_or_else(|e| {
            warn!("Corrupt status on task '{}': {}", row.id, e);
            TaskStatus::default()
        }),
        priority: row.priority.parse().unwrap_or_else(|e| {
            warn!("Corrupt priority on task '{}': {}", row.id, e);
            Priority::default()
        }),
        created_at: parse_created_at(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on task '{}'", row.created_at, row.id);
            DateTime::default()
        }),
        title: row.title,
        description: row.description,
    }
}
