//! Wire model for the chat channel.
//!
//! A channel carries named events with a JSON payload. Text websocket
//! messages hold the JSON form `{"event": "...", "data": ...}`; binary
//! messages hold the same frame encoded as protobuf, with the payload
//! carried as a `google.protobuf.Value`.

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Message text from the remote agent.
pub const BOT_MESSAGE: &str = "bot-message";
/// The remote agent started composing a reply.
pub const BOT_TYPING: &str = "bot-typing";
/// Message text from the local user.
pub const USER_MESSAGE: &str = "user-message";

/// Payload fields checked, in order, when a message event carries an object.
const TEXT_FIELDS: [&str; 3] = ["text", "message", "content"];

/// Error returned by the decoders.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Text message was not a JSON frame.
    #[error("failed to decode json frame: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary message was not a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// Frame decoded but names no event.
    #[error("frame has no event name")]
    MissingEvent,
}

/// A single named event on the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event name, e.g. `"bot-message"`.
    pub event: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    /// Frame whose payload is a bare string.
    #[must_use]
    pub fn text(event: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(event, Value::String(text.into()))
    }

    /// Text carried by a message frame.
    ///
    /// Accepts a bare string payload or an object with a `text`,
    /// `message` or `content` string field.
    #[must_use]
    pub fn text_payload(&self) -> Option<&str> {
        match &self.data {
            Value::String(text) => Some(text),
            Value::Object(map) => TEXT_FIELDS
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str)),
            _ => None,
        }
    }
}

/// Encode a frame as a JSON text message.
#[must_use]
pub fn encode_json(frame: &Frame) -> String {
    // Value and String fields always serialize.
    serde_json::to_string(frame).unwrap_or_default()
}

/// Decode a JSON text message.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text and
/// [`CodecError::MissingEvent`] when the event name is empty.
pub fn decode_json(text: &str) -> Result<Frame, CodecError> {
    let frame: Frame = serde_json::from_str(text)?;
    if frame.event.is_empty() {
        return Err(CodecError::MissingEvent);
    }
    Ok(frame)
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = WireFrame { event: frame.event.clone(), data: Some(to_proto(&frame.data)) };
    // Growable buffers never report `BufferTooSmall`.
    wire.encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::MissingEvent`] when the event name is empty.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    if wire.event.is_empty() {
        return Err(CodecError::MissingEvent);
    }
    let data = wire.data.as_ref().map_or(Value::Null, from_proto);
    Ok(Frame { event: wire.event, data })
}

fn to_proto(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue.into()),
        Value::Bool(flag) => Kind::BoolValue(*flag),
        Value::Number(number) => Kind::NumberValue(number.as_f64().unwrap_or_default()),
        Value::String(text) => Kind::StringValue(text.clone()),
        Value::Array(items) => {
            Kind::ListValue(prost_types::ListValue { values: items.iter().map(to_proto).collect() })
        }
        Value::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map.iter().map(|(key, item)| (key.clone(), to_proto(item))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

fn from_proto(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(flag)) => Value::Bool(*flag),
        Some(Kind::NumberValue(number)) => proto_number(*number),
        Some(Kind::StringValue(text)) => Value::String(text.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(from_proto).collect()),
        Some(Kind::StructValue(object)) => Value::Object(
            object
                .fields
                .iter()
                .map(|(key, item)| (key.clone(), from_proto(item)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// Protobuf numbers are doubles; integral values come back as JSON integers.
fn proto_number(number: f64) -> Value {
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    let integral = (number.fract() == 0.0 && number.abs() < 9.0e15).then(|| number as i64);
    match integral {
        Some(whole) => Value::Number(Number::from(whole)),
        None => Number::from_f64(number).map_or(Value::Null, Value::Number),
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    event: String,
    #[prost(message, optional, tag = "2")]
    data: Option<prost_types::Value>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
