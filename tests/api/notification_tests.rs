//! Notification API Tests

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use nearby_realtime::domain::Notification;

use crate::common::{token_for, MockMessages, MockNotifications, TestApp};

#[tokio::test]
async fn test_create_notification() {
    let mut notifications = MockNotifications::new();
    notifications
        .expect_create()
        .withf(|n| n.user_id == 42 && n.kind == "connection_request")
        .times(1)
        .returning(|n| Ok(n.clone()));
    let app = TestApp::new(MockMessages::new(), notifications);

    let response = app
        .server
        .post("/api/v1/users/42/notifications")
        .authorization_bearer(token_for(1))
        .json(&json!({
            "kind": "connection_request",
            "title": "Maya wants to connect",
            "data": {"fromUserId": 1}
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["read"], false);
    assert_eq!(body["data"]["fromUserId"], 1);
    assert!(body.get("body").is_none());
}

#[tokio::test]
async fn test_create_notification_for_me() {
    let mut notifications = MockNotifications::new();
    notifications
        .expect_create()
        .withf(|n| n.user_id == 7 && n.kind == "reminder")
        .times(1)
        .returning(|n| Ok(n.clone()));
    let app = TestApp::new(MockMessages::new(), notifications);

    let response = app
        .server
        .post("/api/v1/users/@me/notifications")
        .authorization_bearer(token_for(7))
        .json(&json!({"kind": "reminder", "title": "Meetup starts soon"}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["kind"], "reminder");
}

#[tokio::test]
async fn test_create_notification_rejects_bad_user_id() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app
        .server
        .post("/api/v1/users/someone/notifications")
        .authorization_bearer(token_for(1))
        .json(&json!({"kind": "reminder", "title": "x"}))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_unread_notifications() {
    let mut notifications = MockNotifications::new();
    notifications
        .expect_find_by_user()
        .withf(|user_id, unread_only, limit| *user_id == 9 && *unread_only && *limit == 10)
        .times(1)
        .returning(|user_id, _, _| {
            Ok(vec![Notification::new(
                user_id,
                "event_invite".into(),
                "Sunset hike".into(),
                None,
                None,
            )])
        });
    let app = TestApp::new(MockMessages::new(), notifications);

    let response = app
        .server
        .get("/api/v1/users/@me/notifications")
        .add_query_param("unread_only", true)
        .add_query_param("limit", 10)
        .authorization_bearer(token_for(9))
        .await;

    response.assert_status_ok();
    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["kind"], "event_invite");
}

#[tokio::test]
async fn test_mark_read() {
    let id = Uuid::now_v7();
    let mut notifications = MockNotifications::new();
    notifications
        .expect_mark_read()
        .withf(move |user_id, nid| *user_id == 9 && *nid == id)
        .times(1)
        .returning(|_, _| Ok(true));
    let app = TestApp::new(MockMessages::new(), notifications);

    let response = app
        .server
        .post(&format!("/api/v1/users/@me/notifications/{}/read", id))
        .authorization_bearer(token_for(9))
        .await;

    response.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_mark_read_unknown_is_not_found() {
    let mut notifications = MockNotifications::new();
    notifications
        .expect_mark_read()
        .returning(|_, _| Ok(false));
    let app = TestApp::new(MockMessages::new(), notifications);

    let response = app
        .server
        .post(&format!(
            "/api/v1/users/@me/notifications/{}/read",
            Uuid::now_v7()
        ))
        .authorization_bearer(token_for(9))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}
