//! WebSocket connections: framing, dispatch and per-connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use pollroom_shared::protocol::{ClientEvent, ServerEvent};
use pollroom_shared::PollError;

use crate::api::AppState;
use crate::hub::ConnectionId;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, mut outbound) = state.hub.connect().await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task: drain this connection's queue into the socket. Ends when the hub
    // drops the queue (kick) or the socket fails.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let json = match event.to_json() {
                Ok(j) => j,
                Err(e) => {
                    warn!(error = %e, "Failed to encode event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    // Task: read client frames and dispatch them.
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => dispatch(&recv_state, conn_id, &text).await,
                Message::Binary(_) => {
                    let error = PollError::Malformed("binary frames are not supported".into());
                    reject(&recv_state, conn_id, error).await;
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.disconnect(conn_id).await;
}

/// Handle one text frame from a connection. Failures are reported to that
/// connection only.
pub async fn dispatch(state: &AppState, conn_id: ConnectionId, text: &str) {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(conn = %conn_id, error = %e, "Rejected malformed frame");
            reject(state, conn_id, PollError::Malformed(e.to_string())).await;
            return;
        }
    };

    debug!(conn = %conn_id, event = event.name(), "Received event");

    let result = match event {
        ClientEvent::JoinChat { username } => state.hub.join_chat(conn_id, username).await,
        ClientEvent::ChatMessage(fields) => {
            state.hub.chat_message(fields).await;
            Ok(())
        }
        ClientEvent::CreatePoll(request) => state.coordinator.create_poll(request).await.map(|_| ()),
        ClientEvent::SubmitAnswer(answer) => state
            .coordinator
            .submit_vote(&answer.poll_id, &answer.username, &answer.option)
            .await
            .map(|_| ()),
        ClientEvent::KickOut(target) => match state.hub.kick(conn_id, &target).await {
            Err(PollError::Unauthorized) => {
                // Not reported back: a refused kick has no visible effect.
                warn!(conn = %conn_id, target = %target, "Kick refused for non-teacher connection");
                Ok(())
            }
            other => other.map(|_| ()),
        },
    };

    if let Err(e) = result {
        reject(state, conn_id, e).await;
    }
}

async fn reject(state: &AppState, conn_id: ConnectionId, error: PollError) {
    debug!(conn = %conn_id, error = %error, "Operation rejected");
    state
        .hub
        .send_to(conn_id, ServerEvent::error(error.to_string()))
        .await;
}
