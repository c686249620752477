//! `WebSocket` handler for the live monitor.
//!
//! Clients connect to `GET /ws/monitor`. Each socket is registered with
//! the [`WsHub`](crate::hub::WsHub) and split in two: a writer task
//! drains the connection's frame queue into the socket, and the reader
//! loop dispatches client frames. Every outbound frame, direct reply or
//! broadcast increment, goes through the same queue so a connection
//! sees them in the order they were queued.
//!
//! A connection receives nothing until it authenticates. The first
//! successful `authenticate` frame sends the full backlog of both
//! buffers; after that the broadcast loop delivers increments.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use logrelay_types::ConnectionId;
use tracing::{debug, info, warn};

use crate::frames::{ClientFrame, ServerFrame};
use crate::state::AppState;

/// Upgrade an HTTP request to a monitor `WebSocket`.
///
/// # Route
///
/// `GET /ws/monitor`
pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Drive one connection until either side closes it.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (connection, mut frames) = state.hub.register();
    debug!(%connection, "WebSocket client connected");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = frames.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(%connection, "WebSocket client disconnected (send failed)");
                break;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_text(&state, connection, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%connection, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(%connection, "WebSocket error: {e}");
                        break;
                    }
                    // Pings are answered by the protocol layer.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    close_connection(&state, connection);
    writer.abort();
}

/// Forget a closed connection: its subscription first, then its hub
/// entry, so the group leave still finds the connection.
pub(crate) fn close_connection(state: &AppState, connection: ConnectionId) {
    if state.accumulator.forget_connection(connection) {
        debug!(%connection, "Authenticated observer disconnected");
    }
    state.hub.unregister(connection);
}

/// Parse and act on one text frame from a client.
///
/// Replies are queued on the connection's hub queue.
pub(crate) fn handle_client_text(state: &AppState, connection: ConnectionId, text: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(%connection, error = %e, "Malformed client frame");
            reply(state, connection, &ServerFrame::Error { message: "malformed frame" });
            return;
        }
    };

    match frame {
        ClientFrame::Authenticate { token } => {
            if !state.authorizes(&token) {
                warn!(%connection, "Rejected observer authentication");
                reply(state, connection, &ServerFrame::Error { message: "invalid token" });
                return;
            }
            match state.accumulator.mark_authenticated(connection) {
                Ok(_) => {
                    info!(%connection, "Observer authenticated");
                    reply(state, connection, &ServerFrame::Authenticated { connection_id: connection });
                    send_snapshots(state, connection);
                }
                Err(e) => {
                    warn!(%connection, error = %e, "Failed to register subscriber");
                    reply(state, connection, &ServerFrame::Error { message: "authentication failed" });
                }
            }
        }
        ClientFrame::Logout => {
            let revoked = state.accumulator.clear_authenticated();
            info!(%connection, revoked, "Observer logout invalidated all sessions");
        }
        ClientFrame::RequestSnapshot => {
            if state.accumulator.is_authenticated(connection) {
                send_snapshots(state, connection);
            } else {
                reply(state, connection, &ServerFrame::Error { message: "not authenticated" });
            }
        }
    }
}

fn send_snapshots(state: &AppState, connection: ConnectionId) {
    let events = state.accumulator.all_events();
    let debugs = state.accumulator.all_debugs();
    reply(state, connection, &ServerFrame::AllEvents { messages: &events.messages });
    reply(state, connection, &ServerFrame::AllDebugs { messages: &debugs.messages });
}

fn reply(state: &AppState, connection: ConnectionId, frame: &ServerFrame<'_>) {
    if let Err(e) = state.hub.send_to(connection, frame) {
        debug!(%connection, error = %e, "Dropped reply");
    }
}
