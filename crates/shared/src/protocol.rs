use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{action::Action, error::ProtocolError, meta::Meta};

pub const PROTOCOL_VERSION: u32 = 4;

/// Separator written between frames of one response body.
pub const FRAME_SEPARATOR: &str = ",";

/// Closed set of answer tags understood by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Approved,
    Processed,
    Forbidden,
    Error,
    UnknownAction,
    UnknownChannel,
    Denied,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Approved => "approved",
            Status::Processed => "processed",
            Status::Forbidden => "forbidden",
            Status::Error => "error",
            Status::UnknownAction => "unknownAction",
            Status::UnknownChannel => "unknownChannel",
            Status::Denied => "denied",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command travelling between the bus and the adapter.
///
/// On the wire every command is a JSON array led by its tag, e.g.
/// `["action", {"type": "added"}, {"id": "10:abc", "time": 1}]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Action { action: Action, meta: Meta },
}

impl Command {
    pub fn action(action: Action, meta: Meta) -> Self {
        Self::Action { action, meta }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Command::Action { .. } => "action",
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Command::Action { action, meta } => (self.tag(), action, meta).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = Vec::<Value>::deserialize(deserializer)?;
        Command::try_from(parts).map_err(de::Error::custom)
    }
}

impl TryFrom<Vec<Value>> for Command {
    type Error = ProtocolError;

    fn try_from(parts: Vec<Value>) -> Result<Self, Self::Error> {
        let mut parts = parts.into_iter();
        let tag = parts.next();
        match tag.as_ref().and_then(Value::as_str) {
            Some("action") => {
                let (Some(action), Some(Value::Object(meta)), None) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(ProtocolError::MalformedCommand(
                        "action command must be [\"action\", action, meta]".into(),
                    ));
                };
                Ok(Command::Action {
                    action: Action::try_from(action)?,
                    meta: Meta::from_fields(meta)?,
                })
            }
            Some(other) => Err(ProtocolError::MalformedCommand(format!(
                "unsupported command `{other}`"
            ))),
            None => Err(ProtocolError::MalformedCommand(
                "command must start with a string tag".into(),
            )),
        }
    }
}

/// A frame the adapter writes back to the bus in reply to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Status {
        status: Status,
        id: String,
        details: Option<Value>,
    },
    Resend {
        id: String,
        targets: Value,
    },
}

impl Answer {
    pub fn status(status: Status, id: impl Into<String>) -> Self {
        Self::Status {
            status,
            id: id.into(),
            details: None,
        }
    }

    pub fn status_with(status: Status, id: impl Into<String>, details: Option<Value>) -> Self {
        Self::Status {
            status,
            id: id.into(),
            details,
        }
    }

    pub fn resend(id: impl Into<String>, targets: Value) -> Self {
        Self::Resend {
            id: id.into(),
            targets,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Answer::Status {
                status,
                id,
                details: None,
            } => Value::Array(vec![status.as_str().into(), id.as_str().into()]),
            Answer::Status {
                status,
                id,
                details: Some(details),
            } => Value::Array(vec![
                status.as_str().into(),
                id.as_str().into(),
                details.clone(),
            ]),
            Answer::Resend { id, targets } => {
                Value::Array(vec!["resend".into(), id.as_str().into(), targets.clone()])
            }
        }
    }
}

impl Serialize for Answer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// HTTP body exchanged with the bus in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub version: u32,
    pub secret: String,
    pub commands: Vec<Command>,
}

impl BusEnvelope {
    pub fn new(secret: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            secret: secret.into(),
            commands,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
