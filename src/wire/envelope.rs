//! Envelope codec: `{type, payload}` records and the decode table.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{SubagentEvent, WireMessage};
use crate::error::{Result, TurnwireError};

/// One encoded [`WireMessage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEnvelope {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub payload: Value,
}

impl WireEnvelope {
    pub fn from_message(msg: &WireMessage) -> Result<Self> {
        let mut value = serde_json::to_value(msg)?;
        let payload = value
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(Self {
            type_name: msg.type_name().to_string(),
            payload,
        })
    }
}

type DecodeFn = fn(&WireRegistry, Value) -> Result<WireMessage>;

/// Immutable decode table from tag to payload decoder.
///
/// Built once from the fixed variant set and passed explicitly to whatever
/// needs to decode.
pub struct WireRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl WireRegistry {
    pub fn new() -> Self {
        let mut decoders: HashMap<&'static str, DecodeFn> = HashMap::new();
        decoders.insert("TurnBegin", |_, v| {
            Ok(WireMessage::TurnBegin(payload("TurnBegin", v)?))
        });
        decoders.insert("StepBegin", |_, v| {
            Ok(WireMessage::StepBegin(payload("StepBegin", v)?))
        });
        decoders.insert("StepInterrupted", |_, v| {
            Ok(WireMessage::StepInterrupted(payload("StepInterrupted", v)?))
        });
        decoders.insert("CompactionBegin", |_, v| {
            Ok(WireMessage::CompactionBegin(payload("CompactionBegin", v)?))
        });
        decoders.insert("CompactionEnd", |_, v| {
            Ok(WireMessage::CompactionEnd(payload("CompactionEnd", v)?))
        });
        decoders.insert("StatusUpdate", |_, v| {
            Ok(WireMessage::StatusUpdate(payload("StatusUpdate", v)?))
        });
        decoders.insert("ContentPart", |_, v| {
            Ok(WireMessage::ContentPart(payload("ContentPart", v)?))
        });
        decoders.insert("ToolCall", |_, v| {
            Ok(WireMessage::ToolCall(payload("ToolCall", v)?))
        });
        decoders.insert("ToolCallPart", |_, v| {
            Ok(WireMessage::ToolCallPart(payload("ToolCallPart", v)?))
        });
        decoders.insert("ToolResult", |_, v| {
            Ok(WireMessage::ToolResult(payload("ToolResult", v)?))
        });
        decoders.insert("SubagentEvent", decode_subagent_event);
        decoders.insert("ApprovalRequestResolved", |_, v| {
            Ok(WireMessage::ApprovalRequestResolved(payload(
                "ApprovalRequestResolved",
                v,
            )?))
        });
        decoders.insert("ApprovalRequest", |_, v| {
            Ok(WireMessage::ApprovalRequest(payload("ApprovalRequest", v)?))
        });
        Self { decoders }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    pub fn decode(&self, envelope: WireEnvelope) -> Result<WireMessage> {
        let decode = self
            .decoders
            .get(envelope.type_name.as_str())
            .ok_or_else(|| TurnwireError::UnknownWireVariant(envelope.type_name.clone()))?;
        decode(self, envelope.payload)
    }

    /// Decode a JSON value shaped like an envelope.
    pub fn decode_value(&self, value: Value) -> Result<WireMessage> {
        let envelope: WireEnvelope = serde_json::from_value(value)
            .map_err(|e| TurnwireError::invalid_payload("<envelope>", e))?;
        self.decode(envelope)
    }

    pub fn decode_str(&self, json: &str) -> Result<WireMessage> {
        self.decode_value(serde_json::from_str(json)?)
    }
}

impl Default for WireRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WireRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("WireRegistry").field("tags", &tags).finish()
    }
}

/// Encode a message to its envelope JSON string.
pub fn encode(msg: &WireMessage) -> Result<String> {
    Ok(serde_json::to_string(&WireEnvelope::from_message(msg)?)?)
}

fn payload<T: DeserializeOwned>(tag: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| TurnwireError::invalid_payload(tag, e))
}

#[derive(Deserialize)]
struct RawSubagentEvent {
    task_tool_call_id: String,
    event: WireEnvelope,
}

fn decode_subagent_event(registry: &WireRegistry, value: Value) -> Result<WireMessage> {
    let raw: RawSubagentEvent = payload("SubagentEvent", value)?;
    let inner = registry.decode(raw.event)?;
    let event = SubagentEvent::new(raw.task_tool_call_id, inner)
        .map_err(|e| TurnwireError::invalid_payload("SubagentEvent", e))?;
    Ok(WireMessage::SubagentEvent(event))
}
