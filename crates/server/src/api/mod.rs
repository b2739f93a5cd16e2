use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dispatch::Stream;
use serde::Deserialize;
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{Command, PROTOCOL_VERSION},
};
use tracing::{error, info, warn};

use crate::app_state::AppState;

pub fn commands_route() -> &'static str {
    "/logux"
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    version: u32,
    secret: String,
    commands: Vec<Vec<Value>>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(commands_route(), post(receive_commands))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive_commands(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiFailure> {
    let envelope: RawEnvelope = serde_json::from_slice(&body).map_err(|e| {
        failure(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            format!("malformed command envelope: {e}"),
        )
    })?;

    if envelope.version != PROTOCOL_VERSION {
        warn!(version = envelope.version, "api: unsupported protocol version");
        return Err(failure(
            StatusCode::BAD_REQUEST,
            ErrorCode::UnsupportedVersion,
            format!(
                "protocol version {} is not supported, expected {PROTOCOL_VERSION}",
                envelope.version
            ),
        ));
    }

    if envelope.secret != state.secret {
        warn!("api: rejected command batch with wrong secret");
        return Err(failure(
            StatusCode::FORBIDDEN,
            ErrorCode::Forbidden,
            "wrong secret",
        ));
    }

    let commands = envelope
        .commands
        .into_iter()
        .map(Command::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::from(e))))?;

    info!(count = commands.len(), "api: command batch received");

    let stream = Stream::shared();
    state
        .dispatcher
        .dispatch(commands, Arc::clone(&stream))
        .await
        .map_err(|e| {
            error!(error = %e, "api: failed to answer command batch");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                e.to_string(),
            )
        })?;

    let body = stream
        .lock()
        .map_err(|_| {
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "response stream poisoned",
            )
        })?
        .body();

    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

fn failure(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiError::new(code, message)))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
