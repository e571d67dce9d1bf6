use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use inkpad_core::Identity;
use tokio::sync::mpsc;

use super::protocol::ServerEvent;
use super::session::RelaySession;
use crate::auth::AuthUser;
use crate::AppState;

/// Outbound frames buffered per connection
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket handler for the realtime relay; the token is checked before upgrading
async fn ws_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = auth.identity();
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    let user_id = identity.user_id;
    let mut session = RelaySession::new(identity, state.notebooks.clone(), state.rooms.clone(), tx);
    let conn = session.connection_id();
    tracing::debug!(conn = %conn, user_id = %user_id, "relay connection opened");

    // Forward replies and room events to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode relay event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages from this client
    loop {
        tokio::select! {
            _ = &mut send_task => break,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => session.handle_frame(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn = %conn, "relay socket error: {}", e);
                    break;
                }
            },
        }
    }

    session.close().await;
    send_task.abort();

    tracing::debug!(conn = %conn, user_id = %user_id, "relay connection closed");
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
