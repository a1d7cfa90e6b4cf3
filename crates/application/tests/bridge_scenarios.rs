mod common;

use std::sync::Arc;
use std::time::Duration;

use application::messaging::{CommandListener, CommandRoute};
use application::{BridgeManager, MqttSyncEngine, ProjectorBridge};
use async_trait::async_trait;
use common::*;
use domain::DomainError;
use infrastructure::transport::SimulatorConfig;
use infrastructure::{MqttConfig, MqttMessage, MqttSubscriberClient, ProjectorConfig, TransportConfig};
use mockall::mock;
use rumqttc::QoS;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

mock! {
    pub Subscriber {}

    #[async_trait]
    impl MqttSubscriberClient for Subscriber {
        async fn subscribe(&self, topic: &str) -> anyhow::Result<()>;
        fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage>;
        async fn ack(&self, topic: &str, pkid: u16, qos: QoS) -> anyhow::Result<()>;
    }
}

fn projector_config(name: &str) -> ProjectorConfig {
    ProjectorConfig::new(name, TransportConfig::Simulator(simulator()))
}

fn message(topic: &str, payload: &str) -> MqttMessage {
    MqttMessage {
        topic: topic.to_string(),
        payload: payload.as_bytes().to_vec(),
        pkid: 1,
        qos: QoS::AtLeastOnce,
    }
}

async fn start_bridge(faults: Faults) -> (ProjectorBridge, mpsc::UnboundedReceiver<Published>) {
    let (client, published) = ChannelMqttClient::new();
    let mut bridge =
        ProjectorBridge::new(projector_config("lr"), &MqttConfig::default(), client).unwrap();
    bridge
        .start_with(Box::new(FaultyTransport::new(simulator(), faults)))
        .await
        .unwrap();
    (bridge, published)
}

fn listener_for(bridge: &ProjectorBridge) -> CommandListener {
    CommandListener::new(
        Arc::new(MockSubscriber::new()),
        vec![CommandRoute {
            engine: bridge.engine(),
            handle: bridge.handle().unwrap(),
        }],
        CancellationToken::new(),
    )
}

async fn until_published(
    rx: &mut mpsc::UnboundedReceiver<Published>,
    topic: &str,
) -> Vec<Published> {
    let mut seen = Vec::new();
    loop {
        let published = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for publish")
            .expect("publish channel closed");
        let done = published.0 == topic;
        seen.push(published);
        if done {
            return seen;
        }
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Published>) -> Vec<Published> {
    let mut seen = Vec::new();
    while let Ok(published) = rx.try_recv() {
        seen.push(published);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_power_set_on_publishes_warming_up() {
    let (mut bridge, mut published) = start_bridge(Faults::default()).await;
    let listener = listener_for(&bridge);

    assert!(listener.handle_message(&message("epson/lr/power/set", "ON")));

    let mut seen = Vec::new();
    loop {
        seen.extend(until_published(&mut published, "epson/lr/power/state").await);
        if seen.last().is_some_and(|(_, payload, _)| payload == "warming_up") {
            break;
        }
    }

    assert_eq!(
        seen[0],
        ("epson/lr/availability".to_string(), "offline".to_string(), true)
    );
    assert!(seen.contains(&("epson/lr/availability".to_string(), "online".to_string(), true)));
    assert!(seen.last().is_some_and(|(_, _, retain)| *retain));

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_status_published_once() {
    let (mut bridge, mut published) = start_bridge(Faults::default()).await;

    tokio::time::sleep(Duration::from_secs(35)).await;
    bridge.stop().await;

    let seen = drain(&mut published);
    let power: Vec<&str> = seen
        .iter()
        .filter(|(topic, _, _)| topic == "epson/lr/power/state")
        .map(|(_, payload, _)| payload.as_str())
        .collect();
    assert_eq!(power, vec!["off"]);

    let availability: Vec<&str> = seen
        .iter()
        .filter(|(topic, _, _)| topic == "epson/lr/availability")
        .map(|(_, payload, _)| payload.as_str())
        .collect();
    assert_eq!(availability, vec!["offline", "online", "offline"]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_payload_is_dropped() {
    let (mut bridge, _published) = start_bridge(Faults::default()).await;
    let listener = listener_for(&bridge);
    let handle = bridge.handle().unwrap();

    assert!(!listener.handle_message(&message("epson/lr/input/set", "vga9")));
    assert!(!listener.handle_message(&message("epson/lr/lens_memory/set", "11")));
    assert!(!listener.handle_message(&message("epson/other/power/set", "on")));
    assert_eq!(handle.queued(), 0);

    assert!(listener.handle_message(&message("epson/lr/key/set", "Menu")));
    assert_eq!(handle.queued(), 1);

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_failure_is_reported_on_mqtt() {
    let faults = Faults::default();
    faults.fail_next_send(DomainError::IoTimeout(2000));
    faults.fail_next_send(DomainError::IoTimeout(2000));
    let (mut bridge, mut published) = start_bridge(faults).await;
    let listener = listener_for(&bridge);

    assert!(listener.handle_message(&message("epson/lr/mute/set", "on")));

    let seen = until_published(&mut published, "epson/lr/command_failed").await;
    let (_, payload, retain) = seen.last().unwrap();
    assert!(!retain);
    let body: serde_json::Value = serde_json::from_str(payload).unwrap();
    assert_eq!(body["command"], "set_mute(true)");
    assert_eq!(body["origin"], "mqtt");
    assert!(body["ts"].is_string());

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_picture_level_set_reaches_projector() {
    let (mut bridge, mut published) = start_bridge(Faults::default()).await;
    let listener = listener_for(&bridge);

    assert!(listener.handle_message(&message("epson/lr/power/set", "on")));
    // Warm-up, then the next poll reads the picture settings
    until_published(&mut published, "epson/lr/sharpness/state").await;

    assert!(listener.handle_message(&message("epson/lr/brightness/set", "40")));
    let mut seen = Vec::new();
    loop {
        seen.extend(until_published(&mut published, "epson/lr/brightness/state").await);
        if seen.last().is_some_and(|(_, payload, _)| payload == "40") {
            break;
        }
    }

    assert!(!listener.handle_message(&message("epson/lr/brightness/set", "140")));
    assert!(listener.handle_message(&message("epson/lr/image_memory/set", "2")));

    bridge.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_listener_subscribes_routes_and_acks() {
    let (client, _published) = ChannelMqttClient::new();
    let engine = Arc::new(
        MqttSyncEngine::new(projector(), "epson", client, None).unwrap(),
    );
    let (_scheduler, harness) = Harness::build(Faults::default());
    let handle = harness.handle.clone();

    let (tx, rx) = broadcast::channel(16);
    let mut subscriber = MockSubscriber::new();
    subscriber
        .expect_subscribe()
        .withf(|topic: &str| topic.starts_with("epson/lr/") && topic.ends_with("/set"))
        .times(11)
        .returning(|_| Ok(()));
    subscriber.expect_subscribe_messages().return_once(move || rx);
    subscriber
        .expect_ack()
        .withf(|topic: &str, pkid: &u16, qos: &QoS| {
            topic == "epson/lr/power/set" && *pkid == 7 && *qos == QoS::AtLeastOnce
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    // QoS 0 carries no packet id; the QoS travels with the ack
    subscriber
        .expect_ack()
        .withf(|_: &str, pkid: &u16, qos: &QoS| *pkid == 0 && *qos == QoS::AtMostOnce)
        .times(1)
        .returning(|_, _, _| Ok(()));

    let cancel = CancellationToken::new();
    let listener = CommandListener::new(
        Arc::new(subscriber),
        vec![CommandRoute {
            engine,
            handle: handle.clone(),
        }],
        cancel.clone(),
    );
    let task = tokio::spawn(async move { listener.start().await });

    tx.send(MqttMessage {
        topic: "epson/lr/power/set".to_string(),
        payload: b"on".to_vec(),
        pkid: 0,
        qos: QoS::AtMostOnce,
    })
    .unwrap();
    tx.send(MqttMessage {
        topic: "epson/lr/power/set".to_string(),
        payload: b"off".to_vec(),
        pkid: 7,
        qos: QoS::AtLeastOnce,
    })
    .unwrap();

    tokio::time::timeout(WAIT, async {
        while handle.queued() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("command was never queued");

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_manager_starts_valid_projectors_only() {
    let (client, mut published) = ChannelMqttClient::new();
    let (_tx, rx) = broadcast::channel(16);
    let mut subscriber = MockSubscriber::new();
    subscriber.expect_subscribe().returning(|_| Ok(()));
    subscriber.expect_subscribe_messages().return_once(move || rx);

    let manager = BridgeManager::new(MqttConfig::default(), client, Arc::new(subscriber));

    let mut fast = projector_config("lr");
    fast.transport = TransportConfig::Simulator(SimulatorConfig {
        warmup_ms: 100,
        ..simulator()
    });
    let started = manager
        .start_all(vec![fast, projector_config("bad/name"), projector_config("lr")])
        .await
        .unwrap();

    assert_eq!(started, 1);
    assert_eq!(manager.running().await, vec!["lr".to_string()]);
    assert!(manager.handle("lr").await.is_some());
    assert!(manager.handle("bad/name").await.is_none());

    until_published(&mut published, "epson/lr/power/state").await;
    manager.stop_all().await;

    let seen = drain(&mut published);
    assert_eq!(
        seen.last(),
        Some(&("epson/lr/availability".to_string(), "offline".to_string(), true))
    );
    assert!(manager.running().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_broker_reconnect_restores_retained_state() {
    let (client, mut published) = ChannelMqttClient::new();
    let (_tx, rx) = broadcast::channel(16);
    let mut subscriber = MockSubscriber::new();
    subscriber.expect_subscribe().returning(|_| Ok(()));
    subscriber.expect_subscribe_messages().return_once(move || rx);

    let manager = Arc::new(BridgeManager::new(
        MqttConfig::default(),
        client,
        Arc::new(subscriber),
    ));
    manager.start_all(vec![projector_config("lr")]).await.unwrap();
    manager.publish_online().await.unwrap();
    until_published(&mut published, "epson/lr/power/state").await;

    let (connections_tx, connections) = watch::channel(0u64);
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let manager = manager.clone();
        let cancel = cancel.clone();
        async move { manager.watch_broker(connections, cancel).await }
    });

    // First connection: startup already published everything
    connections_tx.send(1).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(drain(&mut published).is_empty());

    connections_tx.send(2).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let seen = drain(&mut published);

    assert_eq!(
        seen.first(),
        Some(&("epson/bridge/status".to_string(), "online".to_string(), true))
    );
    assert!(seen.contains(&("epson/lr/availability".to_string(), "online".to_string(), true)));
    assert!(seen.contains(&("epson/lr/power/state".to_string(), "off".to_string(), true)));
    assert!(seen.iter().all(|(_, _, retain)| *retain));

    cancel.cancel();
    watcher.await.unwrap();
    manager.stop_all().await;
}
