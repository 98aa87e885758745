//! WebSocket handler implementation.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warden_monitor::{CapabilitySet, ErrorPayload, GatewaySession};

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

use super::message::{ClientMessage, ServerMessage};

/// Outbound replies queued per connection, separate from the alert queue.
const REPLY_BUFFER: usize = 32;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. The token comes from `?token=` or, failing
/// that, a bearer header.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = params.token.as_deref().or_else(|| bearer_token(&headers));
    let capabilities = state.capabilities_for(token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, capabilities)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, capabilities: CapabilitySet) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    let (session, mut alerts) =
        match GatewaySession::open(Arc::clone(&state.monitor), connection_id.clone(), capabilities) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Rejecting WebSocket connection: {}", e);
                if let Ok(json) = serde_json::to_string(&ServerMessage::Error(ErrorPayload::from(&e))) {
                    let _ = sender.send(Message::Text(json.into())).await;
                }
                let _ = sender.send(Message::Close(None)).await;
                return;
            }
        };
    let session = Arc::new(session);
    info!("WebSocket connected: {}", connection_id);

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(REPLY_BUFFER);
    let _ = tx
        .send(ServerMessage::Connected {
            connection_id: connection_id.clone(),
        })
        .await;

    // Alerts end when the session disconnects or fan-out closes.
    let sender_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(msg) = rx.recv() => msg,
                alert = alerts.recv() => match alert {
                    Some(notification) => ServerMessage::Alert(notification),
                    None => break,
                },
            };
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode WebSocket message: {}", e),
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                debug!("Received: {}", text.as_str());
                let msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Failed to parse WebSocket message: {}", e);
                        let reply = ServerMessage::error("Failed to parse message", "parse_error");
                        if tx.send(reply).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if matches!(msg, ClientMessage::TriggerCheck { .. }) {
                    // Probes can take up to their timeout; keep reading meanwhile.
                    let session = Arc::clone(&session);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let reply = respond(&session, msg).await;
                        let _ = tx.send(reply).await;
                    });
                } else if tx.send(respond(&session, msg).await).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket closed: {}", connection_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
        }
    }

    session.close();
    sender_task.abort();
    info!("WebSocket disconnected: {}", connection_id);
}

/// Reply to one client message.
pub(crate) async fn respond(session: &GatewaySession, msg: ClientMessage) -> ServerMessage {
    let result = match msg {
        ClientMessage::Subscribe { group } => session.subscribe(&group).map(ServerMessage::Ack),
        ClientMessage::Unsubscribe { group } => {
            session.unsubscribe(&group).map(ServerMessage::Ack)
        }
        ClientMessage::GetSnapshot => Ok(ServerMessage::Snapshot(session.get_snapshot())),
        ClientMessage::TriggerCheck { endpoint } => session
            .trigger_manual_check(&endpoint)
            .await
            .map(ServerMessage::CheckResult),
        ClientMessage::GetMetrics => session
            .get_metrics()
            .map(|content| ServerMessage::Metrics { content }),
        ClientMessage::Ping { timestamp } => Ok(ServerMessage::Pong { timestamp }),
    };

    result.unwrap_or_else(|e| {
        debug!("Gateway request from {} failed: {}", session.id(), e);
        ServerMessage::Error(ErrorPayload::from(&e))
    })
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
