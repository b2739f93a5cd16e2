use shared::error::ProtocolError;
use thiserror::Error;

use crate::{bus::BusError, stream::StreamError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("controller has no bus attached for send-back")]
    BusUnavailable,
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
