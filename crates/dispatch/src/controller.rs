//! Per-action controller.
//!
//! One [`ActionController`] is built for every inbound action and dropped
//! once the action is answered. It turns handler decisions into protocol
//! output: a [`Response`], an `action` command pushed back to the sender,
//! or a resend request delegated to the injected [`Resending`] callback.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use serde_json::{json, Map, Value};
use shared::{
    protocol::{Answer, Command, Status},
    Action, Meta,
};
use tracing::debug;

use crate::{
    authorization::AuthorizationFlag,
    bus::Bus,
    error::DispatchError,
    stream::{Chunk, StreamError, StreamWriter},
};

type ResendFn = dyn Fn(&Value) -> Result<(), StreamError> + Send + Sync;

/// Callback performing the resend side effect for one action.
pub struct Resending(Box<ResendFn>);

impl Resending {
    pub fn new<F>(resend: F) -> Self
    where
        F: Fn(&Value) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        Self(Box::new(resend))
    }

    /// Writes `["resend", meta_id, targets]` followed by a separator.
    ///
    /// `meta_id` must be the id of the meta the controller is built with.
    pub fn to_stream<W>(stream: Arc<Mutex<W>>, meta_id: impl Into<String>) -> Self
    where
        W: StreamWriter + 'static,
    {
        let meta_id = meta_id.into();
        Self::new(move |targets| {
            let frame = Answer::resend(meta_id.as_str(), targets.clone()).to_value();
            let mut stream = stream.lock().map_err(|_| StreamError::Poisoned)?;
            stream.write(Chunk::Json(&frame))?;
            stream.write(Chunk::separator())
        })
    }

    fn call(&self, targets: &Value) -> Result<(), StreamError> {
        (self.0)(targets)
    }
}

impl fmt::Debug for Resending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resending(..)")
    }
}

/// Answer produced by [`ActionController::respond`].
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    action: Arc<Action>,
    custom_data: Option<Value>,
    meta: Meta,
}

impl Response {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn custom_data(&self) -> Option<&Value> {
        self.custom_data.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Frame answering the inbound action identified by `action_id`.
    pub fn answer(&self, action_id: &str) -> Answer {
        Answer::status_with(self.status, action_id, self.custom_data.clone())
    }
}

pub struct ActionController {
    action: Arc<Action>,
    meta: Arc<Meta>,
    resending: Resending,
    bus: Option<Arc<dyn Bus>>,
}

impl ActionController {
    pub fn new(action: Arc<Action>, meta: Arc<Meta>, resending: Resending) -> Self {
        Self {
            action,
            meta,
            resending,
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn meta(&self) -> &Arc<Meta> {
        &self.meta
    }

    pub fn respond(&self, status: Status) -> Response {
        self.respond_with(status, None)
    }

    pub fn respond_with(&self, status: Status, custom_data: Option<Value>) -> Response {
        Response {
            status,
            action: Arc::clone(&self.action),
            custom_data,
            meta: Meta::new(),
        }
    }

    /// Pushes `back_action` to the client that sent the current action.
    ///
    /// Keys from `back_meta` override the generated `id` and `time`, but
    /// `clients` is always replaced with the sender's client id.
    pub async fn send_back(
        &self,
        back_action: Action,
        back_meta: Map<String, Value>,
    ) -> Result<(), DispatchError> {
        let bus = self.bus.as_ref().ok_or(DispatchError::BusUnavailable)?;

        let mut delivery = Meta::new().overlaid(back_meta);
        delivery.insert("clients", json!([self.meta.client_id()]))?;

        debug!(
            action_id = %self.meta.id(),
            client_id = %self.meta.client_id(),
            back_type = %back_action.action_type(),
            "sending action back"
        );
        bus.send(vec![Command::action(back_action, delivery)]).await?;
        Ok(())
    }

    pub fn resend(&self, targets: Value) -> Result<(), DispatchError> {
        debug!(action_id = %self.meta.id(), %targets, "resending action");
        self.resending.call(&targets)?;
        Ok(())
    }

    /// Requires an authorization policy for every action, process-wide.
    pub fn verify_authorized() {
        AuthorizationFlag::global().verify();
    }

    /// Lets actions without an authorization policy through, process-wide.
    pub fn unverify_authorized() {
        AuthorizationFlag::global().unverify();
    }
}

impl fmt::Debug for ActionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionController")
            .field("action", &self.action)
            .field("meta", &self.meta)
            .field("has_bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
