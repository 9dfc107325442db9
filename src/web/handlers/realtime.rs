use crate::models::ServerMessage;
use crate::services::{media, text};
use crate::web::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// GET /ws
pub async fn websocket(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn snapshot(state: &AppState) -> anyhow::Result<ServerMessage> {
    Ok(ServerMessage::Snapshot {
        media: media::list_library(&state.db)?,
        text: text::list_text(&state.db)?,
    })
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode realtime message: {}", e);
            false
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before reading the snapshot so no change falls in between.
    let mut rx = state.broadcaster.subscribe();
    tracing::info!(
        "Client connected, {} subscribers",
        state.broadcaster.subscriber_count()
    );

    match snapshot(&state) {
        Ok(message) => {
            if !send(&mut socket, &message).await {
                return;
            }
        }
        Err(e) => {
            tracing::error!("Failed to build snapshot: {:?}", e);
            return;
        }
    }

    loop {
        tokio::select! {
            received = rx.recv() => {
                let message = match received {
                    Ok(change) => ServerMessage::Change { change },
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Realtime subscriber lagged by {} events", missed);
                        ServerMessage::Resync { missed }
                    }
                    Err(RecvError::Closed) => break,
                };
                if !send(&mut socket, &message).await {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients only listen; anything else they send is ignored.
                Some(Ok(_)) => {}
            }
        }
    }

    tracing::info!("Client disconnected");
}

/// GET /api/events
pub async fn event_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let keep_alive = Duration::from_secs(state.config.realtime.keep_alive_secs);
    Sse::new(change_stream(&state)).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}

fn change_stream(state: &AppState) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(state.broadcaster.subscribe()).filter_map(|received| async move {
        let message = match received {
            Ok(change) => ServerMessage::Change { change },
            Err(BroadcastStreamRecvError::Lagged(missed)) => ServerMessage::Resync { missed },
        };
        let name = match &message {
            ServerMessage::Snapshot { .. } => "snapshot",
            ServerMessage::Change { .. } => "change",
            ServerMessage::Resync { .. } => "resync",
        };
        Event::default().event(name).json_data(&message).ok().map(Ok)
    })
}
