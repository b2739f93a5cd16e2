use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Forbidden,
    Validation,
    UnsupportedVersion,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Violations of the action/meta wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("action is missing a string `type` field")]
    MissingActionType,
    #[error("meta `id` must be a non-empty string")]
    InvalidMetaId,
    #[error("meta `time` must be an integer timestamp")]
    InvalidMetaTime,
    #[error("meta key `{0}` is reserved and cannot be overwritten")]
    ReservedMetaKey(String),
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

impl From<ProtocolError> for ApiError {
    fn from(value: ProtocolError) -> Self {
        Self::new(ErrorCode::Validation, value.to_string())
    }
}
