//! Outbound frame stream.
//!
//! Frames are appended in call order and joined by the transport into one
//! response body. A chunk is either a JSON value or a raw token such as
//! the frame separator.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use shared::protocol::FRAME_SEPARATOR;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream is closed")]
    Closed,
    #[error("stream lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy)]
pub enum Chunk<'a> {
    Json(&'a Value),
    Raw(&'a str),
}

impl Chunk<'_> {
    pub fn separator() -> Chunk<'static> {
        Chunk::Raw(FRAME_SEPARATOR)
    }
}

pub trait StreamWriter: Send {
    fn write(&mut self, chunk: Chunk<'_>) -> Result<(), StreamError>;
}

/// Stream shared between the dispatcher and resend callbacks.
pub type SharedStream = Arc<Mutex<Stream>>;

/// In-memory stream buffering every chunk as a string.
#[derive(Debug, Default)]
pub struct Stream {
    chunks: Vec<String>,
    closed: bool,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStream {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Joins every chunk into a JSON array body.
    pub fn body(&self) -> String {
        let len = self.chunks.iter().map(String::len).sum::<usize>();
        let mut body = String::with_capacity(len + 2);
        body.push('[');
        for chunk in &self.chunks {
            body.push_str(chunk);
        }
        body.push(']');
        body
    }
}

impl StreamWriter for Stream {
    fn write(&mut self, chunk: Chunk<'_>) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let encoded = match chunk {
            Chunk::Json(value) => value.to_string(),
            Chunk::Raw(token) => token.to_string(),
        };
        self.chunks.push(encoded);
        Ok(())
    }
}

impl<W: StreamWriter> StreamWriter for Arc<Mutex<W>> {
    fn write(&mut self, chunk: Chunk<'_>) -> Result<(), StreamError> {
        self.lock()
            .map_err(|_| StreamError::Poisoned)?
            .write(chunk)
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
