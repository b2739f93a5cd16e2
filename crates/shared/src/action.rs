use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// A typed command exchanged over the bus.
///
/// Always carries a string `type`; every other field is opaque to the
/// adapter. Equality is structural over the whole mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Action {
    fields: Map<String, Value>,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("type".into(), Value::String(action_type.into()));
        Self { fields }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn action_type(&self) -> &str {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Map<String, Value>> for Action {
    type Error = ProtocolError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("type") {
            Some(Value::String(_)) => Ok(Self { fields }),
            _ => Err(ProtocolError::MissingActionType),
        }
    }
}

impl TryFrom<Value> for Action {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            _ => Err(ProtocolError::MissingActionType),
        }
    }
}

impl From<Action> for Map<String, Value> {
    fn from(value: Action) -> Self {
        value.fields
    }
}

impl From<Action> for Value {
    fn from(value: Action) -> Self {
        Value::Object(value.fields)
    }
}

#[cfg(test)]
#[path = "tests/action_tests.rs"]
mod tests;
