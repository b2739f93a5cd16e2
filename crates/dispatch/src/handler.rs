use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    protocol::{Answer, Command, Status},
    Action, Meta,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    authorization::AuthorizationFlag,
    bus::Bus,
    controller::{ActionController, Resending, Response},
    error::DispatchError,
    stream::{Chunk, StreamWriter},
};

#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DispatchError> for HandlerError {
    fn from(value: DispatchError) -> Self {
        Self::new(value.to_string())
    }
}

/// Application logic for one action type.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Authorization policy. `None` means the handler has no policy.
    fn authorize(&self, _controller: &ActionController) -> Option<bool> {
        None
    }

    async fn process(&self, controller: &ActionController) -> Result<Response, HandlerError>;
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        action_type: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.insert(action_type.into(), handler)
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runs inbound command batches through their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    authorization: AuthorizationFlag,
    bus: Option<Arc<dyn Bus>>,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, authorization: AuthorizationFlag) -> Self {
        Self {
            registry: Arc::new(registry),
            authorization,
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn authorization(&self) -> &AuthorizationFlag {
        &self.authorization
    }

    /// Answers every command in order, separating answers with `,`.
    ///
    /// Handler failures become `error` frames; stream failures abort the
    /// batch.
    pub async fn dispatch<W>(
        &self,
        commands: Vec<Command>,
        stream: Arc<Mutex<W>>,
    ) -> Result<(), DispatchError>
    where
        W: StreamWriter + 'static,
    {
        let mut writer = Arc::clone(&stream);
        for (index, command) in commands.into_iter().enumerate() {
            if index > 0 {
                writer.write(Chunk::separator())?;
            }
            let Command::Action { action, meta } = command;
            self.dispatch_action(action, meta, &stream).await?;
        }
        Ok(())
    }

    async fn dispatch_action<W>(
        &self,
        action: Action,
        meta: Meta,
        stream: &Arc<Mutex<W>>,
    ) -> Result<(), DispatchError>
    where
        W: StreamWriter + 'static,
    {
        let mut writer = Arc::clone(stream);
        let action_id = meta.id().to_string();

        let Some(handler) = self.registry.get(action.action_type()) else {
            warn!(
                action_id = %action_id,
                action_type = %action.action_type(),
                "dispatch: no handler for action type"
            );
            write_answer(&mut writer, &Answer::status(Status::UnknownAction, &action_id))?;
            return Ok(());
        };

        let mut controller = ActionController::new(
            Arc::new(action),
            Arc::new(meta),
            Resending::to_stream(Arc::clone(stream), action_id.as_str()),
        );
        if let Some(bus) = &self.bus {
            controller = controller.with_bus(Arc::clone(bus));
        }

        if !self.is_authorized(handler.as_ref(), &controller) {
            write_answer(&mut writer, &Answer::status(Status::Forbidden, &action_id))?;
            return Ok(());
        }

        write_answer(&mut writer, &Answer::status(Status::Approved, &action_id))?;
        writer.write(Chunk::separator())?;

        let answer = match handler.process(&controller).await {
            Ok(response) => {
                info!(
                    action_id = %action_id,
                    action_type = %controller.action().action_type(),
                    status = %response.status(),
                    "dispatch: action answered"
                );
                response.answer(&action_id)
            }
            Err(err) => {
                error!(
                    action_id = %action_id,
                    action_type = %controller.action().action_type(),
                    error = %err,
                    "dispatch: handler failed"
                );
                Answer::status_with(
                    Status::Error,
                    &action_id,
                    Some(Value::String(err.to_string())),
                )
            }
        };
        write_answer(&mut writer, &answer)?;
        Ok(())
    }

    fn is_authorized(&self, handler: &dyn ActionHandler, controller: &ActionController) -> bool {
        match handler.authorize(controller) {
            Some(decision) => decision,
            None if self.authorization.is_verifying() => {
                warn!(
                    action_id = %controller.meta().id(),
                    action_type = %controller.action().action_type(),
                    "dispatch: handler has no authorization policy"
                );
                false
            }
            None => true,
        }
    }
}

fn write_answer<W: StreamWriter>(writer: &mut W, answer: &Answer) -> Result<(), DispatchError> {
    writer.write(Chunk::Json(&answer.to_value()))?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/handler_tests.rs"]
mod tests;
