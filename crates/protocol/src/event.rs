//! Event codec: inbound text frames to records, records to outbound frames.
//!
//! Events are flat JSON objects. Inbound events are kept as loosely typed
//! records since unknown or missing fields are tolerated and interpreted
//! per event type by the router. Outbound events are the payload plus two
//! server-assigned fields, `from_user` and `server_timestamp`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;
use crate::constants::EventType;
use crate::messages::Payload;

/// A flat JSON object.
pub type Record = serde_json::Map<String, Value>;

/// Field carrying the sender identity on outbound events.
pub const FROM_USER_FIELD: &str = "from_user";

/// Field carrying the server clock (ms since epoch) on outbound events.
pub const SERVER_TIMESTAMP_FIELD: &str = "server_timestamp";

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    fields: Record,
}

impl Event {
    /// Returns the raw `type` value, if any.
    pub fn raw_type(&self) -> Option<&Value> {
        self.fields.get("type")
    }

    /// Returns the event type if `type` is a recognized wire name.
    pub fn event_type(&self) -> Option<EventType> {
        self.raw_type()
            .and_then(Value::as_str)
            .and_then(EventType::from_wire)
    }

    /// Renders the `type` field for diagnostics.
    ///
    /// Strings are returned as-is, anything else as its JSON text
    /// (`null` when the field is missing).
    pub fn type_name(&self) -> String {
        match self.raw_type() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "null".into(),
        }
    }

    /// Returns a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a field only if it is present and not empty.
    ///
    /// `null`, `false`, `0`, `""`, `[]` and `{}` all count as absent.
    pub fn non_empty(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| is_present(v))
    }

    /// Returns a string field if it is present and non-empty.
    pub fn identity_field(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns the `strokes` array, or an empty slice when missing or not an array.
    pub fn strokes(&self) -> &[Value] {
        match self.get("strokes") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Parses a raw text frame into an [`Event`].
///
/// Fails if the text is not JSON or does not hold an object.
pub fn decode(raw_text: &str) -> Result<Event, ProtocolError> {
    match serde_json::from_str::<Value>(raw_text)? {
        Value::Object(fields) => Ok(Event { fields }),
        _ => Err(ProtocolError::NotAnObject),
    }
}

/// An event ready to be sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundEvent {
    fields: Record,
}

impl OutboundEvent {
    /// Returns the sender identity.
    pub fn from_user(&self) -> Option<&str> {
        self.fields.get(FROM_USER_FIELD).and_then(Value::as_str)
    }

    /// Returns the server timestamp in milliseconds.
    pub fn server_timestamp(&self) -> Option<i64> {
        self.fields.get(SERVER_TIMESTAMP_FIELD).and_then(Value::as_i64)
    }

    /// Returns the event type if `type` is a recognized wire name.
    pub fn event_type(&self) -> Option<EventType> {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .and_then(EventType::from_wire)
    }

    /// Returns a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serializes to a JSON text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }
}

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stamps `payload` with `from_user` and the current server time.
///
/// Returns a shallow copy; existing `from_user`/`server_timestamp` keys
/// are overwritten.
pub fn encode(payload: &Record, from_user: &str) -> OutboundEvent {
    encode_at(payload, from_user, now_millis())
}

/// Like [`encode`] with an explicit timestamp.
pub fn encode_at(payload: &Record, from_user: &str, server_timestamp: i64) -> OutboundEvent {
    let mut fields = payload.clone();
    fields.insert(FROM_USER_FIELD.into(), Value::from(from_user));
    fields.insert(SERVER_TIMESTAMP_FIELD.into(), Value::from(server_timestamp));
    OutboundEvent { fields }
}

/// Serializes a typed payload, tags it with its `type` and stamps it.
pub fn encode_payload<P: Payload>(payload: &P, from_user: &str) -> Result<OutboundEvent, ProtocolError> {
    let mut record = match serde_json::to_value(payload).map_err(ProtocolError::Serialize)? {
        Value::Object(record) => record,
        _ => return Err(ProtocolError::NotARecordPayload),
    };
    record.insert("type".into(), Value::from(P::TYPE.as_str()));
    Ok(encode(&record, from_user))
}
