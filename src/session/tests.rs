use std::sync::Arc;
use std::time::Duration;

use super::mqtt::qos_from_level;
use super::{
    BrokerClient, BrokerConnector, LoopbackBroker, LoopbackConnector, MqttConnector,
    SessionManager, SessionOptions, SessionState,
};
use crate::config::Settings;
use crate::flags::{FlagWriter, flag};
use crate::queue::{Message, MessageQueue};
use crate::utils::error::{RestartReason, TransportError};

struct Fixture {
    broker: LoopbackBroker,
    link: FlagWriter,
    session: Arc<SessionManager<LoopbackConnector>>,
    inbound: Arc<MessageQueue>,
    outbound: Arc<MessageQueue>,
}

fn fixture() -> Fixture {
    let mut options = SessionOptions::from_settings(&Settings::default());
    options.granularity = Duration::from_millis(1);
    let broker = LoopbackBroker::new();
    let link = flag("wifi_is_connected");
    link.set(true);
    let inbound = Arc::new(MessageQueue::new("inbound", 10));
    let outbound = Arc::new(MessageQueue::new("outbound", 10));
    let session = Arc::new(SessionManager::new(
        broker.connector(),
        options,
        link.reader(),
        inbound.clone(),
        outbound.clone(),
    ));
    Fixture {
        broker,
        link,
        session,
        inbound,
        outbound,
    }
}

#[test]
fn test_session_options_from_settings() {
    let settings = Settings::default();
    let options = SessionOptions::from_settings(&settings);
    assert_eq!(options.last_will.topic, "/global/inactive");
    assert!(options.last_will.payload.contains("\"unitID\""));
    assert_eq!(
        options.subscriptions,
        vec![
            "/global/status_request".to_string(),
            "/units/tlvlp.iot.BazsalikON-aero/control".to_string()
        ]
    );
    assert_eq!(options.check_interval, Duration::from_secs(1));
    assert_eq!(options.message_check_interval, Duration::from_millis(100));
}

#[test]
fn test_qos_levels() {
    assert_eq!(qos_from_level(0), rumqttc::QoS::AtMostOnce);
    assert_eq!(qos_from_level(1), rumqttc::QoS::AtLeastOnce);
    assert_eq!(qos_from_level(2), rumqttc::QoS::ExactlyOnce);
}

#[tokio::test]
async fn test_mqtt_client_requires_connect() {
    let settings = Settings::default();
    let connector = MqttConnector::new(settings.unit.unit_id(), &settings.mqtt);
    let mut client = connector.create_client();
    assert!(!client.is_connected());
    assert_eq!(
        client.publish(&Message::new("/global/status", "{}")).await,
        Err(TransportError::NotConnected)
    );
    assert_eq!(client.check_msg().await, Err(TransportError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn test_start_session_connects_and_subscribes() {
    let f = fixture();
    assert_eq!(f.session.state(), SessionState::Disconnected);

    f.session.start_session().await.unwrap();

    assert_eq!(f.session.state(), SessionState::Connected);
    assert!(f.session.connected_flag().get());
    assert_eq!(f.broker.connects(), 1);
    assert_eq!(
        f.broker.subscriptions(),
        vec![
            "/global/status_request".to_string(),
            "/units/tlvlp.iot.BazsalikON-aero/control".to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_start_session_is_a_no_op() {
    let f = fixture();
    let first = tokio::spawn({
        let session = f.session.clone();
        async move { session.start_session().await }
    });
    tokio::task::yield_now().await;
    assert_eq!(f.session.state(), SessionState::Connecting);

    f.session.start_session().await.unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(f.broker.connects(), 1);
    assert_eq!(f.session.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_connect_retries_while_link_is_up() {
    let f = fixture();
    f.broker.set_reachable(false);
    let task = tokio::spawn({
        let session = f.session.clone();
        async move { session.start_session().await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(f.broker.connect_attempts() > 1);
    assert_eq!(f.session.state(), SessionState::Connecting);

    f.broker.set_reachable(true);
    task.await.unwrap().unwrap();
    assert_eq!(f.session.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_broker_failure_during_link_loss_requests_restart() {
    let f = fixture();
    f.broker.set_reachable(false);
    f.link.set(false);

    let result = f.session.start_session().await;

    assert!(matches!(
        result,
        Err(RestartReason::BrokerFailureDuringLinkLoss { .. })
    ));
    assert_eq!(f.session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_failure_abandons_attempt() {
    let f = fixture();
    f.broker.fail_subscriptions(true);

    f.session.start_session().await.unwrap();

    assert_eq!(f.session.state(), SessionState::Disconnected);
    assert_eq!(f.broker.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inbound_messages_reach_the_inbound_queue() {
    let f = fixture();
    f.session.start_session().await.unwrap();
    let poll = tokio::spawn({
        let session = f.session.clone();
        async move { session.inbound_poll().await }
    });

    f.broker.inject(Message::new("/global/status_request", ""));
    f.broker.inject(Message::new("/not/subscribed", "x"));
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(
        f.inbound.try_dequeue(),
        Some(Message::new("/global/status_request", ""))
    );
    assert!(f.inbound.is_empty());
    poll.abort();
}

#[tokio::test(start_paused = true)]
async fn test_outbound_drain_waits_for_connection() {
    let f = fixture();
    let drain = tokio::spawn({
        let session = f.session.clone();
        async move { session.outbound_drain().await }
    });

    for i in 0..3 {
        assert!(f.session.enqueue_outbound(Message::new("/global/status", i.to_string())));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(f.broker.published().is_empty());

    f.session.start_session().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let payloads: Vec<String> = f
        .broker
        .published()
        .into_iter()
        .map(|m| m.payload)
        .collect();
    assert_eq!(payloads, vec!["0", "1", "2"]);
    assert!(f.outbound.is_empty());
    drain.abort();
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_disconnects_and_consumes_message() {
    let f = fixture();
    f.session.start_session().await.unwrap();
    let drain = tokio::spawn({
        let session = f.session.clone();
        async move { session.outbound_drain().await }
    });

    f.broker.drop_connections();
    f.session
        .enqueue_outbound(Message::new("/global/status", "lost"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(f.session.state(), SessionState::Disconnected);
    assert!(f.outbound.is_empty());
    assert!(f.broker.published().is_empty());
    assert_eq!(f.broker.wills_published().len(), 1);
    assert_eq!(f.broker.wills_published()[0].topic, "/global/inactive");
    drain.abort();
}

#[tokio::test(start_paused = true)]
async fn test_connection_checker_recovers_session() {
    let f = fixture();
    let checker = tokio::spawn({
        let session = f.session.clone();
        async move { session.connection_checker().await }
    });
    let poll = tokio::spawn({
        let session = f.session.clone();
        async move { session.inbound_poll().await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(f.session.state(), SessionState::Connected);

    f.broker.drop_connections();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(f.session.state(), SessionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(f.session.state(), SessionState::Connected);
    assert_eq!(f.broker.connects(), 2);
    checker.abort();
    poll.abort();
}

#[tokio::test(start_paused = true)]
async fn test_connection_checker_waits_for_link() {
    let f = fixture();
    f.link.set(false);
    let checker = tokio::spawn({
        let session = f.session.clone();
        async move { session.connection_checker().await }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(f.broker.connect_attempts(), 0);

    f.link.set(true);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(f.session.state(), SessionState::Connected);
    checker.abort();
}

#[tokio::test(start_paused = true)]
async fn test_drain_holds_message_when_session_drops_before_publish() {
    let f = fixture();
    f.session.start_session().await.unwrap();
    f.broker.drop_connections();

    let poll = tokio::spawn({
        let session = f.session.clone();
        async move { session.inbound_poll().await }
    });
    let drain = tokio::spawn({
        let session = f.session.clone();
        async move { session.outbound_drain().await }
    });
    f.session
        .enqueue_outbound(Message::new("/global/status", "held"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(f.session.state(), SessionState::Disconnected);
    assert!(f.broker.published().is_empty());

    f.session.start_session().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let payloads: Vec<String> = f
        .broker
        .published()
        .into_iter()
        .map(|m| m.payload)
        .collect();
    assert_eq!(payloads, vec!["held"]);
    poll.abort();
    drain.abort();
}
