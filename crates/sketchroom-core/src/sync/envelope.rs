//! Wire envelope codec.
//!
//! Outbound messages are double-encoded: the outer envelope's `data` is the
//! JSON text of the inner envelope, whose `Data` is in turn the JSON text of
//! the shape.
//!
//! ```json
//! { "dataType": "drawing", "data": "{\"DataType\":\"drawing\",\"Data\":\"{...shape...}\",\"Code\":\"4821\"}" }
//! ```
//!
//! The legacy relay re-wraps messages as `{dataType, data: <shape JSON>, code}`
//! when replaying room history, so the decoder accepts a bare shape in `data`
//! as well as the inner envelope.

use serde::{Deserialize, Serialize};

use super::{EnvelopeLayer, RoomCode, SyncError};
use crate::shapes::Shape;

/// Data type tag carried by drawing messages at both envelope layers.
pub const DRAWING: &str = "drawing";

/// Outer envelope, the JSON object actually sent over the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuterEnvelope {
    #[serde(rename = "dataType")]
    pub data_type: String,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Inner envelope, JSON-encoded into the outer envelope's `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InnerEnvelope {
    pub data_type: String,
    pub data: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Envelope(InnerEnvelope),
    Shape(Shape),
}

fn malformed(layer: EnvelopeLayer) -> impl FnOnce(serde_json::Error) -> SyncError {
    move |source| SyncError::Malformed { layer, source }
}

/// Encode a shape for the given room as outbound wire text.
pub fn encode_shape(shape: &Shape, room: &RoomCode) -> Result<String, SyncError> {
    let inner = InnerEnvelope {
        data_type: DRAWING.to_string(),
        data: serde_json::to_string(shape).map_err(malformed(EnvelopeLayer::Shape))?,
        code: room.as_str().to_string(),
    };
    let outer = OuterEnvelope {
        data_type: DRAWING.to_string(),
        data: serde_json::to_string(&inner).map_err(malformed(EnvelopeLayer::Inner))?,
        code: None,
    };
    serde_json::to_string(&outer).map_err(malformed(EnvelopeLayer::Outer))
}

/// Decode inbound wire text.
///
/// Returns `Ok(None)` for well-formed messages that carry no drawing, and an
/// error when either layer fails to parse or the envelope names another room.
pub fn decode_message(text: &str, room: &RoomCode) -> Result<Option<Shape>, SyncError> {
    let outer: OuterEnvelope =
        serde_json::from_str(text).map_err(malformed(EnvelopeLayer::Outer))?;
    if outer.data_type != DRAWING {
        return Ok(None);
    }

    let payload: Payload =
        serde_json::from_str(&outer.data).map_err(malformed(EnvelopeLayer::Inner))?;
    match payload {
        Payload::Shape(shape) => Ok(Some(shape)),
        Payload::Envelope(inner) => {
            if inner.data_type != DRAWING {
                return Ok(None);
            }
            if !inner.code.is_empty() && inner.code != room.as_str() {
                return Err(SyncError::RoomMismatch {
                    expected: room.as_str().to_string(),
                    found: inner.code,
                });
            }
            let shape = serde_json::from_str(&inner.data).map_err(malformed(EnvelopeLayer::Shape))?;
            Ok(Some(shape))
        }
    }
}
