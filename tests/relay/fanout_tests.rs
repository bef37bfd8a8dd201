//! Fan-out properties of the relay: echo suppression, cross-instance
//! delivery, degraded mode, malformed input, isolation, unsubscribe.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use nearby_realtime::application::relay::{
    Delivery, Disposition, PublishOutcome, RealtimeRelay,
};
use nearby_realtime::domain::{Channel, ChatType, Envelope, InstanceId};
use nearby_realtime::infrastructure::pubsub::MemoryBus;

use crate::common::{assert_silent, collector, next_delivery, relay_on, NAMESPACE};

#[tokio::test]
async fn test_publisher_never_receives_its_own_envelope() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let channel = Channel::chatroom(ChatType::Group, 5);

    let (on_a, mut rx_a) = collector();
    let (on_b, mut rx_b) = collector();
    a.subscribe(channel.clone(), on_a).await;
    b.subscribe(channel.clone(), on_b).await;

    let outcome = a.publish(&channel, &json!({"type": "new_message"})).await;
    assert_eq!(outcome, PublishOutcome::Published);

    let delivery = next_delivery(&mut rx_b).await;
    assert_eq!(delivery.envelope.origin_instance_id, "inst-a");
    assert_silent(&mut rx_a).await;
    assert_silent(&mut rx_b).await;
}

#[tokio::test]
async fn test_the_user_42_scenario() {
    let bus = MemoryBus::new();
    let inst1 = relay_on(&bus, "inst-1");
    let inst2 = relay_on(&bus, "inst-2");

    let (handler, mut rx) = collector();
    inst2.subscribe_user(42, handler).await;

    inst1
        .publish_user(42, &json!({"type": "notification", "text": "hi"}))
        .await;

    let delivery = next_delivery(&mut rx).await;
    assert_eq!(delivery.channel, Channel::user(42));
    assert_eq!(
        delivery.envelope.payload_value(),
        json!({"type": "notification", "text": "hi"})
    );
    assert_eq!(delivery.envelope.origin_instance_id, "inst-1");
    assert!(delivery.envelope.timestamp > 0);
    assert_silent(&mut rx).await;
}

#[tokio::test]
async fn test_every_subscribed_instance_receives_once() {
    let bus = MemoryBus::new();
    let publisher = relay_on(&bus, "inst-0");
    let channel = Channel::user(7);

    let mut receivers = Vec::new();
    let mut relays = Vec::new();
    for i in 1..=3 {
        let relay = relay_on(&bus, &format!("inst-{}", i));
        let (handler, rx) = collector();
        relay.subscribe(channel.clone(), handler).await;
        receivers.push(rx);
        relays.push(relay);
    }

    publisher.publish(&channel, &json!({"type": "x"})).await;

    for rx in receivers.iter_mut() {
        next_delivery(rx).await;
        assert_silent(rx).await;
    }
}

#[tokio::test]
async fn test_handlers_on_one_channel_all_run_in_subscription_order() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let channel = Channel::user(3);

    let (first, mut rx1) = collector();
    let (second, mut rx2) = collector();
    b.subscribe(channel.clone(), first).await;
    b.subscribe(channel.clone(), second).await;
    assert_eq!(b.handler_count(&channel), 2);

    for n in 0..5 {
        a.publish(&channel, &json!({"type": "seq", "n": n})).await;
    }

    for rx in [&mut rx1, &mut rx2] {
        for n in 0..5 {
            let delivery = next_delivery(rx).await;
            assert_eq!(delivery.envelope.payload["n"], n);
        }
    }
}

#[tokio::test]
async fn test_channel_isolation() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");

    let (dm_handler, mut dm_rx) = collector();
    let (group_handler, mut group_rx) = collector();
    b.subscribe_chatroom(ChatType::Dm, 1, dm_handler).await;
    b.subscribe_chatroom(ChatType::Group, 1, group_handler).await;

    a.publish_chatroom(ChatType::Group, 1, &json!({"type": "new_message"}))
        .await;

    let delivery = next_delivery(&mut group_rx).await;
    assert_eq!(delivery.channel.as_str(), "chat:group:1");
    assert_silent(&mut dm_rx).await;
}

#[tokio::test]
async fn test_single_instance_mode_never_fails() {
    let relay = RealtimeRelay::single_instance(InstanceId::from("solo"), NAMESPACE);
    let (handler, mut rx) = collector();
    relay.subscribe_user(1, handler).await;

    assert!(!relay.is_available());
    let outcome = relay.publish_user(1, &json!({"type": "notification"})).await;
    assert_eq!(outcome, PublishOutcome::Degraded);
    assert_eq!(relay.publish_user(1, &"plain string").await, PublishOutcome::Degraded);
    assert_silent(&mut rx).await;
}

#[tokio::test]
async fn test_broker_outage_degrades_then_recovers() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let (handler, mut rx) = collector();
    b.subscribe_user(8, handler).await;

    bus.set_available(false);
    assert!(!a.is_available());
    assert_eq!(
        a.publish_user(8, &json!({"type": "lost"})).await,
        PublishOutcome::Degraded
    );
    assert_silent(&mut rx).await;

    bus.set_available(true);
    assert_eq!(
        a.publish_user(8, &json!({"type": "kept"})).await,
        PublishOutcome::Published
    );
    let delivery = next_delivery(&mut rx).await;
    assert_eq!(delivery.envelope.payload_type(), Some("kept"));
}

#[tokio::test]
async fn test_subscription_made_during_outage_receives_after_recovery() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");

    bus.set_available(false);
    let (handler, mut rx) = collector();
    b.subscribe_user(9, handler).await;

    bus.set_available(true);
    assert_eq!(
        a.publish_user(9, &json!({"type": "late"})).await,
        PublishOutcome::Published
    );
    let delivery = next_delivery(&mut rx).await;
    assert_eq!(delivery.envelope.payload_type(), Some("late"));
}

#[tokio::test]
async fn test_slow_handler_does_not_delay_other_handlers() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let channel = Channel::chatroom(ChatType::Meetup, 3);

    let started = Arc::new(AtomicUsize::new(0));
    let slow_started = Arc::clone(&started);
    b.subscribe(channel.clone(), move |_delivery: Delivery| {
        let started = Arc::clone(&slow_started);
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, anyhow::Error>(())
        }
    })
    .await;
    let (fast, mut rx) = collector();
    b.subscribe(channel.clone(), fast).await;

    for n in 0..3 {
        a.publish(&channel, &json!({"type": "tick", "n": n})).await;
    }

    let received = tokio::time::timeout(Duration::from_secs(1), async {
        let mut seen = Vec::new();
        while seen.len() < 3 {
            let delivery = rx.recv().await.expect("collector closed");
            seen.push(delivery.envelope.payload_value()["n"].clone());
        }
        seen
    })
    .await
    .expect("fast handler was held up by the slow one");

    assert_eq!(received, vec![json!(0), json!(1), json!(2)]);
    assert!(started.load(Ordering::SeqCst) <= 1);
}

#[tokio::test]
async fn test_malformed_messages_are_dropped_and_relay_keeps_working() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let (handler, mut rx) = collector();
    b.subscribe_user(5, handler).await;

    let broker_channel = Channel::user(5).broker_name(NAMESPACE);
    bus.inject(&broker_channel, "not json at all");
    bus.inject(&broker_channel, r#"{"type":"x"}"#);
    bus.inject(&broker_channel, "[1,2,3]");
    assert_silent(&mut rx).await;

    a.publish_user(5, &json!({"type": "after"})).await;
    let delivery = next_delivery(&mut rx).await;
    assert_eq!(delivery.envelope.payload_type(), Some("after"));
}

#[tokio::test]
async fn test_receive_classifies_raw_messages() {
    let relay = RealtimeRelay::single_instance(InstanceId::from("me"), NAMESPACE);
    let (handler, _rx) = collector();
    relay.subscribe_user(1, handler).await;

    let from_other = Envelope::wrap(&InstanceId::from("other"), json!({"k": 1}), 10)
        .encode()
        .unwrap();
    let from_me = Envelope::wrap(&InstanceId::from("me"), json!({"k": 1}), 10)
        .encode()
        .unwrap();

    assert_eq!(relay.receive("test:user:1", &from_other), Disposition::Delivered(1));
    assert_eq!(relay.receive("test:user:1", &from_me), Disposition::Echo);
    assert_eq!(relay.receive("test:user:1", "{"), Disposition::Malformed);
    assert_eq!(relay.receive("other-app:user:1", &from_other), Disposition::Foreign);
}

#[tokio::test]
async fn test_failing_and_panicking_handlers_do_not_affect_others() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let channel = Channel::user(11);

    let failures = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&failures);
    b.subscribe(channel.clone(), move |_delivery: Delivery| {
        let counted = Arc::clone(&counted);
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::anyhow!("handler exploded"))
        }
    })
    .await;
    b.subscribe(channel.clone(), |delivery: Delivery| async move {
        if delivery.envelope.payload_type().is_some() {
            panic!("handler panicked");
        }
        Ok::<_, anyhow::Error>(())
    })
    .await;
    let (healthy, mut rx) = collector();
    b.subscribe(channel.clone(), healthy).await;

    a.publish(&channel, &json!({"type": "one"})).await;
    a.publish(&channel, &json!({"type": "two"})).await;

    assert_eq!(next_delivery(&mut rx).await.envelope.payload_type(), Some("one"));
    assert_eq!(next_delivery(&mut rx).await.envelope.payload_type(), Some("two"));
    assert_eq!(failures.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let channel = Channel::chatroom(ChatType::Event, 2);

    let (kept, mut kept_rx) = collector();
    let (dropped, mut dropped_rx) = collector();
    b.subscribe(channel.clone(), kept).await;
    let id = b.subscribe(channel.clone(), dropped).await;

    assert!(b.unsubscribe(id).await);
    assert!(!b.unsubscribe(id).await);

    a.publish(&channel, &json!({"type": "after_unsubscribe"})).await;
    next_delivery(&mut kept_rx).await;
    assert_silent(&mut dropped_rx).await;
    assert_eq!(
        bus.subscriber_count(&channel.broker_name(NAMESPACE)),
        1
    );
}

#[tokio::test]
async fn test_non_object_payload_is_carried_under_data() {
    let bus = MemoryBus::new();
    let a = relay_on(&bus, "inst-a");
    let b = relay_on(&bus, "inst-b");
    let (handler, mut rx) = collector();
    b.subscribe_user(2, handler).await;

    a.publish_user(2, &vec![1, 2, 3]).await;

    let delivery = next_delivery(&mut rx).await;
    assert_eq!(delivery.envelope.payload_value(), json!({"data": [1, 2, 3]}));
}
