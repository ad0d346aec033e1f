use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use shellcast_protocol::{ClientFrame, ServerFrame};
use shellcast_store::EffectiveSettings;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::ws::gate::{self, GateDecision};

/// Axum handler — upgrades HTTP to WebSocket at GET /ws/terminal/{id}.
pub async fn ws_handler(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, id, headers, state))
}

/// Runs the attach bridge for one client: gate, replay, subscribe, forward
/// both directions until either side closes, then unsubscribe. Never kills
/// the session — other viewers may still be attached.
async fn handle_connection(socket: WebSocket, id: Uuid, headers: HeaderMap, state: Arc<AppState>) {
    let settings = match EffectiveSettings::resolve(state.sessions.store()) {
        Ok(s) => s,
        Err(e) => {
            warn!(%id, error = %e, "failed to resolve effective settings, rejecting attach");
            return;
        }
    };

    if let GateDecision::Reject(code) = gate::check(&settings, &state.config, &headers) {
        let mut socket = socket;
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: "gate rejected".into(),
            })))
            .await;
        return;
    }

    let attachment = match state.sessions.attach(id) {
        Ok(a) => a,
        Err(e) => {
            warn!(%id, error = %e, "attach failed, closing");
            let mut socket = socket;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    info!(%id, "client attached");
    let (mut tx, mut rx) = socket.split();

    if !attachment.replay.is_empty() {
        let frame = ServerFrame::Replay {
            data: attachment.replay,
        };
        if send_frame(&mut tx, &frame).await.is_err() {
            state.sessions.detach(id, attachment.subscriber_id);
            return;
        }
    }

    let mut output_rx = attachment.receiver;

    loop {
        tokio::select! {
            chunk = output_rx.recv() => {
                match chunk {
                    Some(data) => {
                        let frame = ServerFrame::Output { data };
                        if send_frame(&mut tx, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&text, id, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(%id, error = %e, "ws receive error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.sessions.detach(id, attachment.subscriber_id);
    info!(%id, "client detached");
}

async fn handle_client_frame(text: &str, id: Uuid, state: &Arc<AppState>) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(_) => return,
    };

    match frame {
        ClientFrame::Input { data } => {
            let _ = state.sessions.write(id, data.as_bytes()).await;
        }
        ClientFrame::Resize { cols, rows } => {
            let _ = state.sessions.resize(id, cols, rows).await;
        }
    }
}

async fn send_frame(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    tx.send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}
