// Drives the HTTP handlers directly (no TCP listener) — they're plain async
// functions over axum extractors, so they can be called in-process.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use rusqlite::Connection;
use shellcast_core::BrokerConfig;
use shellcast_gateway::{app, http};
use shellcast_sessions::SessionManager;
use shellcast_store::Store;

fn test_state() -> Arc<app::AppState> {
    let store = Store::from_connection(Connection::open_in_memory().unwrap()).unwrap();
    let sessions = SessionManager::new(store);
    Arc::new(app::AppState::new(BrokerConfig::default(), sessions))
}

#[tokio::test]
async fn create_then_list_then_kill() {
    let state = test_state();

    let created = http::sessions::create_session(
        State(state.clone()),
        Json(http::sessions::CreateSessionBody {
            cwd: None,
            shell: Some("sh".to_string()),
            cols: Some(80),
            rows: Some(24),
        }),
    )
    .await
    .unwrap();
    let id = created.0["id"].as_str().unwrap().to_string();

    let listed = http::sessions::list_sessions(State(state.clone())).await;
    let sessions = listed.0["sessions"].as_array().unwrap();
    assert!(sessions.iter().any(|s| s["id"].as_str() == Some(id.as_str())));

    let id_parsed: uuid::Uuid = id.parse().unwrap();
    let killed = http::sessions::kill_session(State(state.clone()), Path(id_parsed))
        .await
        .unwrap();
    assert_eq!(killed.0["ok"], true);

    let listed_after = http::sessions::list_sessions(State(state)).await;
    let sessions_after = listed_after.0["sessions"].as_array().unwrap();
    assert!(!sessions_after
        .iter()
        .any(|s| s["id"].as_str() == Some(id.as_str())));
}

#[tokio::test]
async fn kill_unknown_session_returns_not_found() {
    let state = test_state();
    let result = http::sessions::kill_session(State(state), Path(uuid::Uuid::new_v4())).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn create_session_defaults_dimensions() {
    let state = test_state();

    let created = http::sessions::create_session(
        State(state.clone()),
        Json(http::sessions::CreateSessionBody {
            cwd: None,
            shell: Some("sh".to_string()),
            cols: None,
            rows: None,
        }),
    )
    .await
    .unwrap();
    let id: uuid::Uuid = created.0["id"].as_str().unwrap().parse().unwrap();

    let listed = http::sessions::list_sessions(State(state.clone())).await;
    let entry = listed.0["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"].as_str() == Some(id.to_string().as_str()))
        .unwrap();
    assert_eq!(entry["cols"], 120);
    assert_eq!(entry["rows"], 30);

    http::sessions::kill_session(State(state), Path(id)).await.unwrap();
}
