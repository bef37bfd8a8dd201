//! Chat Message Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::{MessageHistoryQuery, MessageResponse, SendMessageRequest};
use crate::domain::ChatType;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

fn parse_chatroom(chat_type: &str, chatroom_id: &str) -> Result<(ChatType, i64), AppError> {
    let chat_type = chat_type
        .parse::<ChatType>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let chatroom_id = chatroom_id
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid chatroom ID".into()))?;
    Ok((chat_type, chatroom_id))
}

/// Get messages from a chatroom
pub async fn get_messages(
    State(state): State<AppState>,
    Path((chat_type, chatroom_id)): Path<(String, String)>,
    Query(query): Query<MessageHistoryQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let (chat_type, chatroom_id) = parse_chatroom(&chat_type, &chatroom_id)?;
    query.validate()?;

    let messages = state
        .messaging
        .list_messages(chat_type, chatroom_id, query.before, query.limit)
        .await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Post a message to a chatroom
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((chat_type, chatroom_id)): Path<(String, String)>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let (chat_type, chatroom_id) = parse_chatroom(&chat_type, &chatroom_id)?;
    body.validate()?;

    let message = state
        .messaging
        .send_message(chat_type, chatroom_id, auth.user_id, body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}
