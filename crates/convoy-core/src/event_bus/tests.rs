use super::*;
use crate::channels::Channel;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_publish_subscribe() {
    let bus = EventBus::new(16);
    let mut sub = bus.subscribe(&[Channel::RunStatus]);

    let count = bus
        .publish(Channel::RunStatus, &json!({"runId": "run-1"}))
        .await
        .unwrap();
    assert_eq!(count, 1);

    let msg = sub.recv().await.unwrap();
    assert_eq!(msg.channel, Channel::RunStatus);
    assert_eq!(msg.payload["runId"], "run-1");
}

#[tokio::test]
async fn test_fan_out_to_every_matching_subscriber() {
    let bus = EventBus::new(16);
    let mut subs: Vec<_> = (0..3).map(|_| bus.subscribe(&[Channel::IncidentLog])).collect();
    let mut other = bus.subscribe(&[Channel::Email]);

    assert_eq!(bus.subscriber_count(), 4);
    let count = bus.publish(Channel::IncidentLog, &json!({"n": 1})).await.unwrap();
    assert_eq!(count, 3);

    for sub in &mut subs {
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.payload["n"], 1);
    }
    assert!(tokio::time::timeout(Duration::from_millis(50), other.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_per_channel_order_preserved() {
    let bus = EventBus::new(16);
    let mut sub = bus.subscribe(&[Channel::RunStatus, Channel::AgentProgress]);

    for i in 0..5 {
        bus.publish(Channel::RunStatus, &json!({ "i": i })).await.unwrap();
    }
    for i in 0..5 {
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.payload["i"], i);
    }
}

#[tokio::test]
async fn test_publish_with_no_subscribers() {
    let bus = EventBus::new(16);
    let count = bus.publish(Channel::Booking, &json!({})).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_slow_subscriber_does_not_block_publisher() {
    let bus = EventBus::new(2);
    let mut slow = bus.subscribe(&[Channel::RunStatus]);
    let mut fast = bus.subscribe(&[Channel::RunStatus]);

    for i in 0..2 {
        bus.publish(Channel::RunStatus, &json!({ "i": i })).await.unwrap();
    }
    // drain the fast one so it has room again
    fast.recv().await.unwrap();
    fast.recv().await.unwrap();

    // slow queue is full: the publisher must still return immediately
    let count = tokio::time::timeout(
        Duration::from_millis(100),
        bus.publish(Channel::RunStatus, &json!({"i": 2})),
    )
    .await
    .expect("publish blocked")
    .unwrap();
    assert_eq!(count, 1);

    assert_eq!(fast.recv().await.unwrap().payload["i"], 2);
    assert_eq!(slow.recv().await.unwrap().payload["i"], 0);
    assert_eq!(slow.recv().await.unwrap().payload["i"], 1);
    assert!(tokio::time::timeout(Duration::from_millis(50), slow.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let bus = EventBus::new(16);
    let mut sub = bus.subscribe(&[Channel::RunStatus]);
    assert!(sub.is_active());

    assert!(sub.unsubscribe());
    assert!(!sub.unsubscribe());
    assert!(!sub.is_active());
    assert_eq!(bus.subscriber_count(), 0);

    let count = bus.publish(Channel::RunStatus, &json!({})).await.unwrap();
    assert_eq!(count, 0);
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn test_drop_releases_subscription() {
    let bus = EventBus::new(16);
    {
        let _sub = bus.subscribe(&[Channel::OrderUpdated]);
        assert_eq!(bus.subscriber_count(), 1);
    }
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_clones_share_subscriptions() {
    let bus = EventBus::new(16);
    let publisher = bus.clone();
    let mut sub = bus.subscribe(&[Channel::ShipmentUpdated]);

    publisher
        .publish(Channel::ShipmentUpdated, &json!({"id": "shp-1"}))
        .await
        .unwrap();
    assert_eq!(sub.recv().await.unwrap().payload["id"], "shp-1");
    assert_eq!(bus.transport_name(), "local");
}

#[test]
fn test_message_serialization() {
    let msg = BusMessage::new(Channel::TemperatureAlert, json!({"celsius": 9.5}));
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"channel\":\"temperature-alert\""));
    assert!(json.contains("\"publishedAt\""));

    let back: BusMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back.channel, Channel::TemperatureAlert);
}

#[cfg(feature = "redis-tests")]
#[tokio::test]
async fn test_redis_transport_loopback() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let token = tokio_util::sync::CancellationToken::new();
    let bus = EventBus::redis(&url, 16, token.clone()).unwrap();
    let mut sub = bus.subscribe(&[Channel::RunStatus]);

    // give the listener time to PSUBSCRIBE
    tokio::time::sleep(Duration::from_millis(300)).await;
    bus.publish(Channel::RunStatus, &json!({"via": "redis"})).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.payload["via"], "redis");
    token.cancel();
}
