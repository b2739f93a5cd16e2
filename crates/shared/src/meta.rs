//! Per-action metadata envelope.
//!
//! A [`Meta`] always carries `id` and `time` keys once built; both are
//! filled in when the caller leaves them out, and only [`Meta::overlaid`]
//! may replace them with unchecked caller values. The client id is
//! derived from the id (everything before the first `:`) unless one is
//! supplied explicitly, and never changes afterwards.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::ProtocolError;

pub const CLIENT_ID_SEPARATOR: char = ':';
pub const DEFAULT_NODE: &str = "server";

const ID_KEY: &str = "id";
const TIME_KEY: &str = "time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Meta {
    fields: Map<String, Value>,
    client_id: String,
}

impl Meta {
    pub fn new() -> Self {
        Self::for_node(DEFAULT_NODE)
    }

    /// Builds a fresh meta whose generated id is prefixed with `node`.
    pub fn for_node(node: &str) -> Self {
        let id = generate_id(node);
        let mut fields = Map::new();
        fields.insert(ID_KEY.into(), Value::String(id.clone()));
        fields.insert(TIME_KEY.into(), Value::Number(now_millis().into()));
        Self {
            client_id: derive_client_id(&id),
            fields,
        }
    }

    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, ProtocolError> {
        let id = match fields.get(ID_KEY) {
            None => {
                let id = generate_id(DEFAULT_NODE);
                fields.insert(ID_KEY.into(), Value::String(id.clone()));
                id
            }
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(_) => return Err(ProtocolError::InvalidMetaId),
        };

        match fields.get(TIME_KEY) {
            None => {
                fields.insert(TIME_KEY.into(), Value::Number(now_millis().into()));
            }
            Some(Value::Number(_)) => {}
            Some(_) => return Err(ProtocolError::InvalidMetaTime),
        }

        Ok(Self {
            client_id: derive_client_id(&id),
            fields,
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn id(&self) -> &str {
        self.fields
            .get(ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Milliseconds since the Unix epoch.
    pub fn time(&self) -> i64 {
        self.fields
            .get(TIME_KEY)
            .and_then(Value::as_number)
            .and_then(number_as_millis)
            .unwrap_or_default()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets an extension key. `id` and `time` are fixed at construction.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ProtocolError> {
        let key = key.into();
        if key == ID_KEY || key == TIME_KEY {
            return Err(ProtocolError::ReservedMetaKey(key));
        }
        Ok(self.fields.insert(key, value.into()))
    }

    pub fn extend(&mut self, extensions: Map<String, Value>) -> Result<(), ProtocolError> {
        for (key, value) in extensions {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Copies `fields` over this meta as given, `id` and `time` included.
    ///
    /// For outbound metas whose caller-supplied values are authoritative;
    /// the client id stays the one derived at construction.
    pub fn overlaid(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Map<String, Value>> for Meta {
    type Error = ProtocolError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_fields(fields)
    }
}

impl From<Meta> for Map<String, Value> {
    fn from(value: Meta) -> Self {
        value.fields
    }
}

impl From<Meta> for Value {
    fn from(value: Meta) -> Self {
        Value::Object(value.fields)
    }
}

pub fn derive_client_id(id: &str) -> String {
    id.split(CLIENT_ID_SEPARATOR)
        .next()
        .unwrap_or(id)
        .to_string()
}

fn generate_id(node: &str) -> String {
    format!("{node}{CLIENT_ID_SEPARATOR}{}", Uuid::new_v4().simple())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn number_as_millis(number: &Number) -> Option<i64> {
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|millis| millis as i64))
}

#[cfg(test)]
#[path = "tests/meta_tests.rs"]
mod tests;
