//! Inbound and outbound message types
//!
//! Envelopes arrive as `{"type": "...", "payload": {...}}` and are decoded
//! once, at the boundary, into an [`InboundCommand`].

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::debug;
use translations_bridge_core::FrameId;
use translations_bridge_service::TransportPayload;

use crate::error::{RouterError, RouterResult};

/// Raw envelope shape
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// `getModels` fields
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetModelsRequest {
    #[serde(alias = "fromLanguage")]
    pub source_language: String,
    #[serde(alias = "toLanguage")]
    pub target_language: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub inner_window_id: Option<FrameId>,
}

/// Opaque payload addressed by its `innerWindowId`
#[derive(Debug, Clone, PartialEq)]
pub struct RelayPayload {
    inner_window_id: FrameId,
    body: Map<String, Value>,
}

impl RelayPayload {
    /// Accept any JSON object carrying a string `innerWindowId`
    pub fn from_value(value: Value) -> RouterResult<Self> {
        let Value::Object(body) = value else {
            return Err(RouterError::MalformedRequest(
                "payload must be an object".to_string(),
            ));
        };

        let inner_window_id = match body.get("innerWindowId") {
            Some(Value::String(id)) if !id.is_empty() => FrameId::new(id.clone()),
            _ => {
                return Err(RouterError::MalformedRequest(
                    "payload is missing innerWindowId".to_string(),
                ))
            }
        };

        Ok(Self {
            inner_window_id,
            body,
        })
    }

    pub fn inner_window_id(&self) -> &FrameId {
        &self.inner_window_id
    }

    /// The payload exactly as received
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// Closed set of commands the router understands
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    GetModels(GetModelsRequest),
    Forward(RelayPayload),
    Port(RelayPayload),
    Background(RelayPayload),
}

impl InboundCommand {
    /// Decode an envelope
    pub fn decode(envelope: Value) -> RouterResult<Self> {
        let Envelope { kind, payload } = serde_json::from_value(envelope)?;

        match kind.as_str() {
            "getModels" => Ok(InboundCommand::GetModels(serde_json::from_value(payload)?)),
            "forward" => Ok(InboundCommand::Forward(RelayPayload::from_value(payload)?)),
            "port" => Ok(InboundCommand::Port(RelayPayload::from_value(payload)?)),
            "background" => Ok(InboundCommand::Background(RelayPayload::from_value(payload)?)),
            other => Err(RouterError::MalformedRequest(format!(
                "unknown command type: {}",
                other
            ))),
        }
    }

    /// Command tag, for logging
    pub fn name(&self) -> &'static str {
        match self {
            InboundCommand::GetModels(_) => "getModels",
            InboundCommand::Forward(_) => "forward",
            InboundCommand::Port(_) => "port",
            InboundCommand::Background(_) => "background",
        }
    }
}

/// Outbound reply
///
/// Serializes as the transport payload, as the string `"done"`, or as
/// `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Models(TransportPayload),
    Done,
    Error { error: String },
}

impl Reply {
    /// Error reply carrying only the public text of `err`
    pub fn from_error(err: &RouterError) -> Self {
        Reply::Error {
            error: err.public_message().to_string(),
        }
    }

    pub fn to_value(&self) -> RouterResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reply::Models(payload) => payload.serialize(serializer),
            Reply::Done => serializer.serialize_str("done"),
            Reply::Error { error } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// One-shot channel a reply is written to
#[derive(Debug)]
pub struct ReplyChannel {
    sender: oneshot::Sender<Reply>,
}

impl ReplyChannel {
    /// Create a channel and the receiver its reply arrives on
    pub fn new() -> (Self, oneshot::Receiver<Reply>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn send(self, reply: Reply) {
        if self.sender.send(reply).is_err() {
            debug!("Reply receiver dropped before the reply was sent");
        }
    }
}
