use super::*;
use crate::{bus::RecordingBus, stream::Stream};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

// Serializes tests that flip the process-wide flag.
static GLOBAL_FLAG: Mutex<()> = Mutex::new(());

fn sender_meta() -> Arc<Meta> {
    let mut fields = Map::new();
    fields.insert("id".into(), json!("10:abc"));
    Arc::new(Meta::from_fields(fields).expect("meta"))
}

fn subscribe_action() -> Arc<Action> {
    Arc::new(Action::new("logux/subscribe").with_field("channel", "users"))
}

fn controller_with_stream() -> (ActionController, Arc<Mutex<Stream>>) {
    let meta = sender_meta();
    let stream = Stream::shared();
    let resending = Resending::to_stream(Arc::clone(&stream), meta.id());
    let controller = ActionController::new(subscribe_action(), meta, resending);
    (controller, stream)
}

#[test]
fn respond_returns_response_for_original_action() {
    let (controller, _stream) = controller_with_stream();
    let response = controller.respond(Status::Processed);

    assert_eq!(response.status(), Status::Processed);
    assert!(Arc::ptr_eq(response.action(), controller.action()));
    assert!(response.custom_data().is_none());
}

#[test]
fn respond_sets_fresh_meta_with_time() {
    let (controller, _stream) = controller_with_stream();
    let response = controller.respond_with(Status::Error, Some(json!({ "reason": "db" })));

    assert!(response.meta().has_key("time"));
    assert_ne!(response.meta().id(), controller.meta().id());
    assert_eq!(response.custom_data(), Some(&json!({ "reason": "db" })));
    assert_eq!(
        response.answer("10:abc").to_value(),
        json!(["error", "10:abc", { "reason": "db" }])
    );
}

#[tokio::test]
async fn send_back_targets_the_sender_client() {
    let bus = Arc::new(RecordingBus::new());
    let (controller, _stream) = controller_with_stream();
    let controller = controller.with_bus(bus.clone());

    let mut back_meta = Map::new();
    back_meta.insert("meta_key".into(), json!("meta_value"));
    controller
        .send_back(Action::new("added"), back_meta)
        .await
        .expect("send back");

    let commands = bus.commands();
    assert_eq!(commands.len(), 1);
    let encoded = serde_json::to_value(&commands[0]).expect("json");
    assert_eq!(encoded[0], json!("action"));
    assert_eq!(encoded[1], json!({ "type": "added" }));

    let mut delivered = encoded[2].as_object().cloned().expect("meta object");
    assert!(delivered.remove("id").is_some());
    assert!(delivered.remove("time").is_some());
    assert_eq!(
        Value::Object(delivered),
        json!({ "meta_key": "meta_value", "clients": ["10"] })
    );
}

#[tokio::test]
async fn send_back_overrides_caller_clients() {
    let bus = Arc::new(RecordingBus::new());
    let (controller, _stream) = controller_with_stream();
    let controller = controller.with_bus(bus.clone());

    let mut back_meta = Map::new();
    back_meta.insert("clients".into(), json!(["99", "100"]));
    back_meta.insert("id".into(), json!("20:custom"));
    controller
        .send_back(Action::new("added"), back_meta)
        .await
        .expect("send back");

    let Command::Action { meta, .. } = bus.commands().remove(0);
    assert_eq!(meta.get("clients"), Some(&json!(["10"])));
    assert_eq!(meta.id(), "20:custom");
}

#[tokio::test]
async fn send_back_delivers_caller_meta_without_validation() {
    let bus = Arc::new(RecordingBus::new());
    let (controller, _stream) = controller_with_stream();
    let controller = controller.with_bus(bus.clone());

    let mut back_meta = Map::new();
    back_meta.insert("time".into(), json!("2019-06-19T12:00:00Z"));
    back_meta.insert("id".into(), json!(42));
    back_meta.insert("meta_key".into(), json!("meta_value"));
    controller
        .send_back(Action::new("added"), back_meta)
        .await
        .expect("send back");

    let commands = bus.commands();
    assert_eq!(commands.len(), 1);
    let encoded = serde_json::to_value(&commands[0]).expect("json");
    assert_eq!(
        encoded,
        json!([
            "action",
            { "type": "added" },
            {
                "id": 42,
                "time": "2019-06-19T12:00:00Z",
                "meta_key": "meta_value",
                "clients": ["10"]
            }
        ])
    );
}

#[tokio::test]
async fn send_back_propagates_bus_failure() {
    let (controller, _stream) = controller_with_stream();
    let controller = controller.with_bus(Arc::new(RecordingBus::failing("connection closed")));

    let result = controller.send_back(Action::new("added"), Map::new()).await;
    assert!(matches!(result, Err(DispatchError::Bus(_))));
}

#[tokio::test]
async fn send_back_without_bus_fails() {
    let (controller, _stream) = controller_with_stream();
    let result = controller.send_back(Action::new("added"), Map::new()).await;
    assert!(matches!(result, Err(DispatchError::BusUnavailable)));
}

#[test]
fn resend_writes_resend_frame_then_separator() {
    let (controller, stream) = controller_with_stream();
    let targets = json!({ "channel": "users" });

    controller.resend(targets.clone()).expect("resend");

    let stream = stream.lock().expect("stream");
    let first: Value = serde_json::from_str(&stream.chunks()[0]).expect("json frame");
    assert_eq!(first, json!(["resend", controller.meta().id(), targets]));
    assert_eq!(stream.chunks().last().map(String::as_str), Some(","));
}

#[test]
fn resend_invokes_callback_once_with_targets() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let resending = {
        let calls = Arc::clone(&calls);
        let seen = Arc::clone(&seen);
        Resending::new(move |targets| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().expect("seen").push(targets.clone());
            Ok(())
        })
    };
    let controller = ActionController::new(subscribe_action(), sender_meta(), resending);

    controller
        .resend(json!({ "users": ["10"] }))
        .expect("resend");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().expect("seen"), vec![json!({ "users": ["10"] })]);
}

#[test]
fn resend_surfaces_closed_stream() {
    let (controller, stream) = controller_with_stream();
    stream.lock().expect("stream").close();

    let result = controller.resend(json!({ "channel": "users" }));
    assert!(matches!(
        result,
        Err(DispatchError::Stream(StreamError::Closed))
    ));
}

#[test]
fn verify_authorized_sets_global_flag() {
    let _guard = GLOBAL_FLAG.lock().unwrap_or_else(|e| e.into_inner());
    let flag = AuthorizationFlag::global();

    flag.set(false);
    ActionController::verify_authorized();
    assert!(flag.is_verifying());

    ActionController::verify_authorized();
    assert!(flag.is_verifying());
}

#[test]
fn unverify_authorized_clears_global_flag() {
    let _guard = GLOBAL_FLAG.lock().unwrap_or_else(|e| e.into_inner());
    let flag = AuthorizationFlag::global();

    flag.set(true);
    ActionController::unverify_authorized();
    assert!(!flag.is_verifying());

    ActionController::unverify_authorized();
    assert!(!flag.is_verifying());

    flag.set(true);
}
