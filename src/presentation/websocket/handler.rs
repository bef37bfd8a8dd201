//! WebSocket Connection Handler
//!
//! Connection lifecycle: authenticate within the auth window, register with
//! the gateway, serve client messages until close or idle timeout, then
//! unregister.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use super::messages::{ClientMessage, ServerMessage};
use super::session::SessionState;
use crate::presentation::middleware::auth::verify_token;
use crate::startup::AppState;

/// Time given to the sender task to flush a final error frame
const CLOSE_FLUSH: Duration = Duration::from_millis(100);

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.settings.websocket.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

enum AuthResult {
    Authenticated(i64),
    Rejected(String),
    Closed,
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().simple().to_string();
    tracing::debug!(session_id = %session_id, "New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.settings.websocket.outbound_buffer);

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let auth_timeout = Duration::from_secs(state.settings.websocket.auth_timeout_secs);
    let auth = timeout(auth_timeout, async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Auth { token }) => {
                        return match verify_token(&state.settings.jwt.secret, &token) {
                            Ok(user_id) => AuthResult::Authenticated(user_id),
                            Err(e) => AuthResult::Rejected(e.to_string()),
                        };
                    }
                    _ => {
                        let _ = tx.try_send(ServerMessage::error("Authenticate first"));
                    }
                },
                Ok(Message::Close(_)) | Err(_) => return AuthResult::Closed,
                _ => continue,
            }
        }
        AuthResult::Closed
    })
    .await;

    let user_id = match auth {
        Ok(AuthResult::Authenticated(user_id)) => user_id,
        Ok(AuthResult::Closed) => {
            tracing::debug!(session_id = %session_id, "Connection closed before auth");
            sender_task.abort();
            return;
        }
        Ok(AuthResult::Rejected(reason)) => {
            tracing::debug!(session_id = %session_id, reason = %reason, "Invalid token");
            close_with_error(&tx, sender_task, "Invalid token").await;
            return;
        }
        Err(_) => {
            tracing::debug!(session_id = %session_id, "Auth timeout");
            close_with_error(&tx, sender_task, "Authentication timeout").await;
            return;
        }
    };

    let mut session = SessionState::new(session_id.clone(), user_id);
    state
        .gateway
        .register_session(session_id.clone(), user_id, tx.clone())
        .await;

    let ready = ServerMessage::ready(
        &session_id,
        user_id,
        state.relay.instance_id().as_str(),
    );
    if tx.send(ready).await.is_err() {
        state.gateway.unregister_session(&session_id).await;
        sender_task.abort();
        return;
    }

    tracing::info!(user_id, session_id = %session_id, "User connected");

    let idle_timeout = Duration::from_secs(state.settings.websocket.idle_timeout_secs);
    let mut idle_check = interval((idle_timeout / 4).max(Duration::from_secs(1)));
    idle_check.tick().await;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session.touch();
                        handle_message(&text, &session, &tx, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Ok(_)) => session.touch(),
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            _ = idle_check.tick() => {
                if !session.is_alive(idle_timeout) {
                    tracing::info!(session_id = %session_id, "Idle timeout, closing connection");
                    break;
                }
            }
        }
    }

    state.gateway.unregister_session(&session_id).await;
    sender_task.abort();

    tracing::info!(user_id, session_id = %session_id, "User disconnected");
}

async fn close_with_error(
    tx: &mpsc::Sender<ServerMessage>,
    sender_task: tokio::task::JoinHandle<()>,
    message: &str,
) {
    let _ = tx.try_send(ServerMessage::error(message));
    tokio::time::sleep(CLOSE_FLUSH).await;
    sender_task.abort();
}

/// Handle one client frame after authentication
async fn handle_message(
    text: &str,
    session: &SessionState,
    tx: &mpsc::Sender<ServerMessage>,
    state: &AppState,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(session_id = %session.session_id, error = %e, "Invalid client message");
            let _ = tx.try_send(ServerMessage::error("Invalid message"));
            return;
        }
    };

    match message {
        ClientMessage::Ping => {
            let _ = tx.try_send(ServerMessage::pong());
        }
        ClientMessage::Auth { .. } => {
            let _ = tx.try_send(ServerMessage::error("Already authenticated"));
        }
        ClientMessage::JoinChatroom {
            chat_type,
            chatroom_id,
        } => {
            // Chatroom membership is owned and enforced by the main application.
            state
                .gateway
                .join_chatroom(&session.session_id, chat_type, chatroom_id)
                .await;
            let _ = tx.try_send(ServerMessage::chatroom_joined(chat_type, chatroom_id));
        }
        ClientMessage::LeaveChatroom {
            chat_type,
            chatroom_id,
        } => {
            state
                .gateway
                .leave_chatroom(&session.session_id, chat_type, chatroom_id)
                .await;
            let _ = tx.try_send(ServerMessage::chatroom_left(chat_type, chatroom_id));
        }
        ClientMessage::Typing {
            chat_type,
            chatroom_id,
            is_typing,
        } => {
            state
                .messaging
                .broadcast_typing(chat_type, chatroom_id, session.user_id, is_typing)
                .await;
        }
    }
}
