use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};

use super::{Dispatcher, Route, TopicTable, UnitIdentity};
use crate::config::Settings;
use crate::modules::{Actuator, MemoryPin, ModuleRegistry, Relay, Sensor};
use crate::queue::{Message, MessageQueue};
use crate::utils::error::{DispatchError, ModuleError};

struct FixedSensor(&'static str, f64);

impl Sensor for FixedSensor {
    fn module_id(&self) -> &str {
        self.0
    }

    fn read_primary(&self) -> BoxFuture<'_, (String, f64)> {
        async move { (self.0.to_string(), self.1) }.boxed()
    }
}

struct Fixture {
    dispatcher: Dispatcher,
    outbound: Arc<MessageQueue>,
    growlight: Arc<Relay>,
    irrigation: Arc<Relay>,
    settings: Settings,
}

fn fixture() -> Fixture {
    let settings = Settings::default();
    let growlight = Arc::new(Relay::new("growlight", MemoryPin::new(), true).unwrap());
    let irrigation = Arc::new(Relay::new("irrigation", MemoryPin::new(), true).unwrap());
    let modules = ModuleRegistry::new()
        .with_sensor(Arc::new(FixedSensor("ds18b20|waterTemperatureCelsius", 21.5)))
        .with_actuator(growlight.clone(), true)
        .with_actuator(irrigation.clone(), false);
    let inbound = Arc::new(MessageQueue::new("inbound", 10));
    let outbound = Arc::new(MessageQueue::new("outbound", 10));
    let dispatcher = Dispatcher::new(&settings, modules, inbound, outbound.clone());
    Fixture {
        dispatcher,
        outbound,
        growlight,
        irrigation,
        settings,
    }
}

fn document(message: &Message) -> Map<String, Value> {
    match serde_json::from_str(&message.payload).unwrap() {
        Value::Object(document) => document,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn control(f: &Fixture, payload: &str) -> Message {
    Message::new(f.settings.topics.control.as_str(), payload)
}

#[test]
fn test_topic_table_routes() {
    let table = TopicTable::new("/global/status_request", "/units/x/control");
    assert_eq!(table.route("/global/status_request"), Route::StatusRequest);
    assert_eq!(table.route("/units/x/control"), Route::Control);
    assert_eq!(table.route("/units/y/control"), Route::Unrecognized);
    assert_eq!(table.route(""), Route::Unrecognized);
}

#[test]
fn test_identity_documents() {
    let identity = UnitIdentity::from_settings(&Settings::default().unit);
    let will = identity.last_will("/global/inactive");
    assert_eq!(will.topic, "/global/inactive");
    assert_eq!(
        document(&will),
        json!({
            "unitID": "tlvlp.iot.BazsalikON-aero",
            "project": "tlvlp.iot.BazsalikON",
            "name": "aero",
        })
        .as_object()
        .cloned()
        .unwrap()
    );

    let report = identity.error_report("/global/error", "boom");
    assert_eq!(document(&report)["error"], "boom");
    assert_eq!(document(&report)["name"], "aero");
}

#[tokio::test]
async fn test_status_request_produces_full_snapshot() {
    let f = fixture();
    f.dispatcher
        .dispatch(Message::new("/global/status_request", ""))
        .await;

    let status = f.outbound.try_dequeue().unwrap();
    assert_eq!(status.topic, "/global/status");
    let doc = document(&status);
    assert_eq!(doc["unitID"], "tlvlp.iot.BazsalikON-aero");
    assert_eq!(doc["project"], "tlvlp.iot.BazsalikON");
    assert_eq!(doc["name"], "aero");
    assert_eq!(doc["ds18b20|waterTemperatureCelsius"], 21.5);
    assert_eq!(doc["relay|growlight"], 0);
    assert_eq!(doc["relay|irrigation"], 0);
    assert_eq!(doc["irrigationOnSec"], 120);
    assert_eq!(doc["irrigationOffSec"], 120);
    assert!(f.outbound.is_empty());
}

#[tokio::test]
async fn test_control_switches_relay_and_reports_status() {
    let f = fixture();
    f.dispatcher
        .dispatch(control(&f, r#"{"relay|growlight": 1}"#))
        .await;

    assert_eq!(f.growlight.state(), 1);
    let status = f.outbound.try_dequeue().unwrap();
    assert_eq!(status.topic, "/global/status");
    assert_eq!(document(&status)["relay|growlight"], 1);
    assert!(f.outbound.is_empty());
}

#[tokio::test]
async fn test_repeated_control_is_idempotent() {
    let f = fixture();
    for _ in 0..2 {
        f.dispatcher
            .dispatch(control(&f, r#"{"relay|growlight": 1}"#))
            .await;
    }
    assert_eq!(f.growlight.state(), 1);

    let first = f.outbound.try_dequeue().unwrap();
    let second = f.outbound.try_dequeue().unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_invalid_json_reports_invalid_payload() {
    let f = fixture();
    f.dispatcher.dispatch(control(&f, "not json")).await;

    let report = f.outbound.try_dequeue().unwrap();
    assert_eq!(report.topic, "/global/error");
    let doc = document(&report);
    assert_eq!(doc["error"], "Error! Invalid payload: not json");
    assert_eq!(doc["unitID"], "tlvlp.iot.BazsalikON-aero");
    assert_eq!(f.growlight.state(), 0);
}

#[test]
fn test_non_object_json_is_an_invalid_payload() {
    let f = fixture();
    for payload in ["[1, 2]", "1", "\"relay|growlight\"", "null"] {
        assert!(matches!(
            f.dispatcher.handle_control(payload),
            Err(DispatchError::InvalidPayload { .. })
        ));
    }
}

#[tokio::test]
async fn test_unknown_module_reports_unrecognized_module() {
    let f = fixture();
    let payload = r#"{"relay|heater": 1}"#;
    f.dispatcher.dispatch(control(&f, payload)).await;

    let report = f.outbound.try_dequeue().unwrap();
    assert_eq!(report.topic, "/global/error");
    assert_eq!(
        document(&report)["error"],
        format!("Error! Unrecognized module id: {payload}")
    );
    assert!(f.outbound.is_empty());
}

#[test]
fn test_status_only_actuator_is_not_controllable() {
    let f = fixture();
    let result = f.dispatcher.handle_control(r#"{"relay|irrigation": 1}"#);
    assert!(matches!(
        result,
        Err(DispatchError::UnrecognizedModule { .. })
    ));
    assert_eq!(f.irrigation.state(), 0);
}

#[tokio::test]
async fn test_out_of_range_value_reports_invalid_value() {
    let f = fixture();
    let payload = r#"{"relay|growlight": 2}"#;
    match f.dispatcher.handle_control(payload) {
        Err(DispatchError::InvalidValue { source, .. }) => {
            assert!(matches!(source, ModuleError::InvalidInput { .. }))
        }
        other => panic!("expected invalid value, got {other:?}"),
    }

    f.dispatcher.dispatch(control(&f, payload)).await;
    let report = f.outbound.try_dequeue().unwrap();
    assert_eq!(report.topic, "/global/error");
    assert_eq!(f.growlight.state(), 0);
}

#[test]
fn test_first_controllable_module_wins() {
    let first = Arc::new(Relay::new("a", MemoryPin::new(), true).unwrap());
    let second = Arc::new(Relay::new("b", MemoryPin::new(), true).unwrap());
    let modules = ModuleRegistry::new()
        .with_actuator(first.clone(), true)
        .with_actuator(second.clone(), true);
    let queue = Arc::new(MessageQueue::new("q", 4));
    let dispatcher = Dispatcher::new(&Settings::default(), modules, queue.clone(), queue);

    let switched = dispatcher
        .handle_control(r#"{"relay|b": 1, "relay|a": 1}"#)
        .unwrap();
    assert_eq!(switched, "relay|a");
    assert_eq!(first.state(), 1);
    assert_eq!(second.state(), 0);
}

#[tokio::test]
async fn test_unrecognized_topic_reports_error() {
    let f = fixture();
    f.dispatcher
        .dispatch(Message::new("/somewhere/else", "{}"))
        .await;

    let report = f.outbound.try_dequeue().unwrap();
    assert_eq!(report.topic, "/global/error");
    assert_eq!(
        document(&report)["error"],
        "Error! Unrecognized topic: /somewhere/else"
    );
}

#[tokio::test]
async fn test_run_consumes_inbound_queue() {
    let settings = Settings::default();
    let growlight = Arc::new(Relay::new("growlight", MemoryPin::new(), true).unwrap());
    let inbound = Arc::new(MessageQueue::new("inbound", 10));
    let outbound = Arc::new(MessageQueue::new("outbound", 10));
    let dispatcher = Arc::new(Dispatcher::new(
        &settings,
        ModuleRegistry::new().with_actuator(growlight.clone(), true),
        inbound.clone(),
        outbound.clone(),
    ));

    let task = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run().await }
    });
    inbound.try_enqueue(Message::new(
        settings.topics.control.as_str(),
        r#"{"relay|growlight": 1}"#,
    ));
    let status = tokio::time::timeout(std::time::Duration::from_secs(1), async {
        loop {
            if let Some(message) = outbound.try_dequeue() {
                break message;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(status.topic, "/global/status");
    assert_eq!(growlight.state(), 1);
    assert!(inbound.is_empty());
    task.abort();
}
