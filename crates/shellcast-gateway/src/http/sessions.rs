use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;

const DEFAULT_COLS: u16 = 120;
const DEFAULT_ROWS: u16 = 30;

/// GET /api/sessions — only `running` sessions, newest first.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sessions: Vec<Value> = state
        .sessions
        .list()
        .into_iter()
        .map(|view| {
            json!({
                "id": view.id,
                "cwd": view.cwd,
                "shell": view.shell,
                "pid": view.pid,
                "cols": view.cols,
                "rows": view.rows,
                "created_at": view.created_at,
                "last_activity_at": view.last_activity_at,
                "status": view.status,
            })
        })
        .collect();

    Json(json!({ "sessions": sessions }))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub cwd: Option<String>,
    pub shell: Option<String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

/// POST /api/sessions — spawns a PTY and returns its id.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let id = state
        .sessions
        .create(
            body.cwd,
            body.shell,
            body.cols.unwrap_or(DEFAULT_COLS),
            body.rows.unwrap_or(DEFAULT_ROWS),
        )
        .await
        .map_err(session_error_response)?;

    Ok(Json(json!({ "id": id })))
}

/// DELETE /api/sessions/{id} — kills and evicts a session.
pub async fn kill_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.sessions.kill(id).await.map_err(session_error_response)?;
    Ok(Json(json!({ "ok": true })))
}

fn session_error_response(err: shellcast_sessions::SessionError) -> (StatusCode, Json<Value>) {
    let status = match err {
        shellcast_sessions::SessionError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
        shellcast_sessions::SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        shellcast_sessions::SessionError::PtySpawnFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        shellcast_sessions::SessionError::PtyIoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        shellcast_sessions::SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}
