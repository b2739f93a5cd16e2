use std::sync::Arc;

use async_trait::async_trait;
use dispatch::{
    ActionController, ActionHandler, AuthorizationFlag, Dispatcher, HandlerError,
    HandlerRegistry, RecordingBus, Response, Stream,
};
use serde_json::{json, Map, Value};
use shared::{protocol::Command, Action, Meta, Status};

struct RenameUser;

#[async_trait]
impl ActionHandler for RenameUser {
    fn authorize(&self, controller: &ActionController) -> Option<bool> {
        Some(controller.meta().client_id() == "10")
    }

    async fn process(&self, controller: &ActionController) -> Result<Response, HandlerError> {
        let user = controller
            .action()
            .get("user")
            .cloned()
            .unwrap_or(Value::Null);
        let channel = format!("users/{}", user.as_str().unwrap_or_default());
        controller.resend(json!({ "channel": channel }))?;

        let mut back_meta = Map::new();
        back_meta.insert("reasons".into(), json!(["user"]));
        controller
            .send_back(Action::new("users/renamed").with_field("user", user), back_meta)
            .await?;

        Ok(controller.respond(Status::Processed))
    }
}

fn rename_command(id: &str) -> Command {
    serde_json::from_value(json!([
        "action",
        { "type": "users/rename", "user": "alice", "name": "Alice" },
        { "id": id, "time": 1_700_000_000_000_i64 }
    ]))
    .expect("command")
}

#[tokio::test]
async fn batch_from_bus_is_answered_in_order() {
    let bus = Arc::new(RecordingBus::new());
    let mut registry = HandlerRegistry::new();
    registry.register("users/rename", Arc::new(RenameUser));
    let dispatcher =
        Dispatcher::new(registry, AuthorizationFlag::new(true)).with_bus(bus.clone());

    let stream = Stream::shared();
    dispatcher
        .dispatch(
            vec![rename_command("10:tab"), rename_command("11:tab")],
            Arc::clone(&stream),
        )
        .await
        .expect("dispatch");

    let body: Value =
        serde_json::from_str(&stream.lock().expect("stream").body()).expect("body json");
    assert_eq!(
        body,
        json!([
            ["approved", "10:tab"],
            ["resend", "10:tab", { "channel": "users/alice" }],
            ["processed", "10:tab"],
            ["forbidden", "11:tab"]
        ])
    );

    let commands = bus.commands();
    assert_eq!(commands.len(), 1);
    let Command::Action { action, meta } = &commands[0];
    assert_eq!(action, &Action::new("users/renamed").with_field("user", "alice"));
    assert_eq!(meta.get("clients"), Some(&json!(["10"])));
    assert_eq!(meta.get("reasons"), Some(&json!(["user"])));
    assert!(meta.has_key("time"));
    assert_ne!(meta.id(), "10:tab");
}

#[test]
fn controller_built_from_inbound_meta() {
    let meta: Meta = serde_json::from_value(json!({ "id": "10:abc", "time": 1 })).expect("meta");
    let controller = ActionController::new(
        Arc::new(Action::new("users/rename")),
        Arc::new(meta),
        dispatch::Resending::new(|_| Ok(())),
    );

    let response = controller.respond(Status::Processed);
    assert_eq!(response.status(), Status::Processed);
    assert_eq!(controller.meta().client_id(), "10");
}
