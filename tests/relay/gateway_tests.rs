//! End-to-end fan-out: services on one instance reach sockets attached to
//! another instance through the gateways' relay subscriptions.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use nearby_realtime::application::services::NewNotification;
use nearby_realtime::domain::ChatType;
use nearby_realtime::infrastructure::pubsub::MemoryBus;
use nearby_realtime::presentation::websocket::ServerMessage;
use nearby_realtime::startup::AppState;

use crate::common::{relay_on, test_state, MockMessages, MockNotifications, DELIVERY_WAIT, SETTLE};

fn instance(bus: &MemoryBus, name: &str) -> AppState {
    let mut messages = MockMessages::new();
    messages.expect_create().returning(|m| Ok(m.clone()));
    let mut notifications = MockNotifications::new();
    notifications.expect_create().returning(|n| Ok(n.clone()));
    test_state(relay_on(bus, name), messages, notifications)
}

async fn connect(state: &AppState, session_id: &str, user_id: i64) -> mpsc::Receiver<ServerMessage> {
    let (tx, rx) = mpsc::channel(16);
    state
        .gateway
        .register_session(session_id.into(), user_id, tx)
        .await;
    rx
}

async fn next_event(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(DELIVERY_WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("session closed")
}

async fn assert_no_event(rx: &mut mpsc::Receiver<ServerMessage>) {
    tokio::time::sleep(SETTLE).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected event: {:?}", event);
    }
}

fn notification(title: &str) -> NewNotification {
    NewNotification {
        kind: "connection_request".into(),
        title: title.into(),
        body: None,
        data: None,
    }
}

#[tokio::test]
async fn test_notification_reaches_user_on_other_instance_exactly_once() {
    let bus = MemoryBus::new();
    let inst1 = instance(&bus, "inst-1");
    let inst2 = instance(&bus, "inst-2");

    let mut local_rx = connect(&inst1, "s-local", 42).await;
    let mut remote_rx = connect(&inst2, "s-remote", 42).await;

    tokio_test::assert_ok!(
        inst1
            .notifications
            .notify(42, notification("Lena wants to connect"))
            .await
    );

    let local = next_event(&mut local_rx).await;
    assert_eq!(local.event, "notification:new");
    let remote = next_event(&mut remote_rx).await;
    assert_eq!(remote.event, "notification:new");
    assert_eq!(remote.data["notification"]["title"], "Lena wants to connect");

    assert_no_event(&mut local_rx).await;
    assert_no_event(&mut remote_rx).await;
}

#[tokio::test]
async fn test_chat_message_reaches_room_members_everywhere() {
    let bus = MemoryBus::new();
    let inst1 = instance(&bus, "inst-1");
    let inst2 = instance(&bus, "inst-2");

    let mut member_rx = connect(&inst2, "s-member", 2).await;
    let mut outsider_rx = connect(&inst2, "s-outsider", 3).await;
    assert!(inst2.gateway.join_chatroom("s-member", ChatType::Event, 77).await);

    tokio_test::assert_ok!(
        inst1
            .messaging
            .send_message(ChatType::Event, 77, 1, "Meet at the gate".into())
            .await
    );

    let event = next_event(&mut member_rx).await;
    assert_eq!(event.event, "message:new");
    assert_eq!(event.data["message"]["content"], "Meet at the gate");
    assert_no_event(&mut outsider_rx).await;
}

#[tokio::test]
async fn test_typing_skips_the_typist_on_every_instance() {
    let bus = MemoryBus::new();
    let inst1 = instance(&bus, "inst-1");
    let inst2 = instance(&bus, "inst-2");

    let mut typist_tab = connect(&inst2, "s-typist-tab", 1).await;
    let mut friend_rx = connect(&inst2, "s-friend", 2).await;
    inst2.gateway.join_chatroom("s-typist-tab", ChatType::Dm, 9).await;
    inst2.gateway.join_chatroom("s-friend", ChatType::Dm, 9).await;

    inst1
        .messaging
        .broadcast_typing(ChatType::Dm, 9, 1, true)
        .await;

    let event = next_event(&mut friend_rx).await;
    assert_eq!(event.event, "user:typing");
    assert_eq!(event.data["isTyping"], true);
    assert_no_event(&mut typist_tab).await;
}

#[tokio::test]
async fn test_disconnect_releases_relay_subscriptions() {
    let bus = MemoryBus::new();
    let inst = instance(&bus, "inst-1");

    let _rx = connect(&inst, "s-1", 5).await;
    inst.gateway.join_chatroom("s-1", ChatType::City, 1).await;
    assert_eq!(bus.subscriber_count("nearby-traveler:user:5"), 0);
    assert_eq!(bus.subscriber_count("test:user:5"), 1);
    assert_eq!(bus.subscriber_count("test:chat:city:1"), 1);

    inst.gateway.unregister_session("s-1").await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(bus.subscriber_count("test:user:5"), 0);
    assert_eq!(bus.subscriber_count("test:chat:city:1"), 0);
    assert!(inst.relay.channels().is_empty());
}
