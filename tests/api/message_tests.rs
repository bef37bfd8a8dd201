//! Chat Message API Tests

use axum::http::StatusCode;
use serde_json::{json, Value};

use nearby_realtime::domain::ChatType;

use crate::common::{sample_message, token_for, MockMessages, MockNotifications, TestApp};

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app
        .server
        .get("/api/v1/chatrooms/dm/1/messages")
        .expect_failure()
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], 10003);
}

#[tokio::test]
async fn test_send_message_created() {
    let mut messages = MockMessages::new();
    messages
        .expect_create()
        .withf(|m| m.chat_type == ChatType::Meetup && m.chatroom_id == 12 && m.sender_id == 7)
        .times(1)
        .returning(|m| Ok(m.clone()));
    let app = TestApp::new(messages, MockNotifications::new());

    let response = app
        .server
        .post("/api/v1/chatrooms/meetup/12/messages")
        .authorization_bearer(token_for(7))
        .json(&json!({"content": "Coffee at 10?"}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["content"], "Coffee at 10?");
    assert_eq!(body["chat_type"], "meetup");
    assert_eq!(body["sender_id"], "7");
}

#[tokio::test]
async fn test_send_message_validation() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let too_long = "x".repeat(2001);
    for content in ["", too_long.as_str()] {
        let response = app
            .server
            .post("/api/v1/chatrooms/group/3/messages")
            .authorization_bearer(token_for(1))
            .json(&json!({ "content": content }))
            .expect_failure()
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_unknown_chat_type_rejected() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app
        .server
        .get("/api/v1/chatrooms/forum/3/messages")
        .authorization_bearer(token_for(1))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_uses_default_limit() {
    let mut messages = MockMessages::new();
    messages
        .expect_find_by_chatroom()
        .withf(|chat_type, id, before, limit| {
            *chat_type == ChatType::City && *id == 4 && before.is_none() && *limit == 50
        })
        .times(1)
        .returning(|_, _, _, _| {
            Ok(vec![
                sample_message(ChatType::City, 4, 2),
                sample_message(ChatType::City, 4, 3),
            ])
        });
    let app = TestApp::new(messages, MockNotifications::new());

    let response = app
        .server
        .get("/api/v1/chatrooms/city/4/messages")
        .authorization_bearer(token_for(1))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Vec<Value>>().len(), 2);
}

#[tokio::test]
async fn test_history_limit_out_of_range() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app
        .server
        .get("/api/v1/chatrooms/city/4/messages")
        .add_query_param("limit", 500)
        .authorization_bearer(token_for(1))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
