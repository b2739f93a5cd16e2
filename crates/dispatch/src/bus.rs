use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{BusEnvelope, Command};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bus rejected commands with status {status}")]
    Rejected { status: u16 },
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Sink for commands the adapter pushes to the bus.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn send(&self, commands: Vec<Command>) -> Result<(), BusError>;
}

/// Posts command batches to the bus HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpBus {
    http: Client,
    url: Url,
    secret: String,
}

impl HttpBus {
    pub fn new(url: Url, secret: impl Into<String>, timeout: Duration) -> Result<Self, BusError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            secret: secret.into(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Bus for HttpBus {
    async fn send(&self, commands: Vec<Command>) -> Result<(), BusError> {
        let count = commands.len();
        let envelope = BusEnvelope::new(self.secret.clone(), commands);
        let response = self
            .http
            .post(self.url.clone())
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "bus: commands rejected");
            return Err(BusError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(url = %self.url, count, "bus: commands delivered");
        Ok(())
    }
}

/// Bus double that keeps every command it receives.
#[derive(Debug, Default)]
pub struct RecordingBus {
    commands: Mutex<Vec<Command>>,
    fail_with: Option<String>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that refuses every send with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Bus for RecordingBus {
    async fn send(&self, commands: Vec<Command>) -> Result<(), BusError> {
        if let Some(reason) = &self.fail_with {
            return Err(BusError::Unavailable(reason.clone()));
        }
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(commands);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
