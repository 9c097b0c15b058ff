use {
    axum::{
        Json,
        extract::{Path, State},
        response::IntoResponse,
    },
    serde::Deserialize,
    tracing::info,
};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// All tasks in extraction order.
pub async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.tasks.read().await;
    Json(serde_json::json!({ "tasks": store.list() }))
}

/// Replace a task's status. Any string is accepted.
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = state.tasks.write().await;
    let task = store.update_status(&id, body.status)?;
    info!(task_id = %id, status = %task.status, "task status updated");
    Ok(Json(serde_json::json!({ "success": true, "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.tasks.write().await.delete(&id)?;
    info!(task_id = %id, "task deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}
