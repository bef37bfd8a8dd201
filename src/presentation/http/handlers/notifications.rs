//! Notification Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::{
    CreateNotificationRequest, NotificationListQuery, NotificationResponse,
};
use crate::application::services::NewNotification;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create a notification for a user and push it to their sessions
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), AppError> {
    let user_id: i64 = user_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid user ID".into()))?;
    notify(&state, &auth, user_id, body).await
}

/// Create a notification for the current user (`@me`)
pub async fn create_own_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), AppError> {
    notify(&state, &auth, auth.user_id, body).await
}

async fn notify(
    state: &AppState,
    auth: &AuthUser,
    user_id: i64,
    body: CreateNotificationRequest,
) -> Result<(StatusCode, Json<NotificationResponse>), AppError> {
    body.validate()?;

    let notification = state
        .notifications
        .notify(
            user_id,
            NewNotification {
                kind: body.kind,
                title: body.title,
                body: body.body,
                data: body.data,
            },
        )
        .await?;

    tracing::debug!(sender = auth.user_id, recipient = user_id, "Notification created");
    Ok((StatusCode::CREATED, Json(notification.into())))
}

/// List the current user's notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    query.validate()?;

    let notifications = state
        .notifications
        .list(auth.user_id, query.unread_only, query.limit)
        .await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

/// Mark one of the current user's notifications as read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: Uuid = notification_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid notification ID".into()))?;

    state.notifications.mark_read(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
