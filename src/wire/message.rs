//! The closed set of messages carried on the wire.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, TurnwireError};
use crate::tools::ToolResult;
use crate::types::{ContentPart, Fragment, TokenUsage, ToolCall, ToolCallPart};

/// What the user typed to start a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserInput {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for UserInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnBegin {
    pub user_input: UserInput,
}

/// Start of step `n` (1-based) within a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepBegin {
    pub n: u32,
}

/// The current step was cut short (cancelled or failed).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StepInterrupted {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CompactionBegin {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CompactionEnd {}

/// Periodic status; every field is optional and only set ones changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatusUpdate {
    /// Fraction of the context window in use, `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// An event emitted by a nested agent, tagged with the tool call that runs it.
///
/// The inner event keeps its own `{type, payload}` envelope when encoded.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubagentEvent {
    pub task_tool_call_id: String,
    pub event: Box<WireMessage>,
}

impl SubagentEvent {
    /// Wrap `event`. Requests cannot be nested.
    pub fn new(task_tool_call_id: impl Into<String>, event: WireMessage) -> Result<Self> {
        if !event.is_event() {
            return Err(TurnwireError::InvalidState(format!(
                "{} cannot be nested in a SubagentEvent",
                event.type_name()
            )));
        }
        Ok(Self {
            task_tool_call_id: task_tool_call_id.into(),
            event: Box::new(event),
        })
    }
}

/// Status of one todo item in a [`DisplayBlock::Todo`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub title: String,
    pub status: TodoStatus,
}

/// Rendering hint attached to an approval request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayBlock {
    Brief {
        text: String,
    },
    Diff {
        path: String,
        old_text: String,
        new_text: String,
    },
    Todo {
        items: Vec<TodoItem>,
    },
    /// A block type this version does not know how to render.
    #[serde(other)]
    Unknown,
}

impl DisplayBlock {
    pub fn brief(text: impl Into<String>) -> Self {
        Self::Brief { text: text.into() }
    }

    pub fn diff(
        path: impl Into<String>,
        old_text: impl Into<String>,
        new_text: impl Into<String>,
    ) -> Self {
        Self::Diff {
            path: path.into(),
            old_text: old_text.into(),
            new_text: new_text.into(),
        }
    }
}

/// Permission request for a sensitive action; needs exactly one resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    pub id: String,
    pub tool_call_id: String,
    pub sender: String,
    pub action: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<DisplayBlock>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalResponse {
    Approve,
    /// Approve, and auto-approve the same action for the rest of the session.
    ApproveForSession,
    Reject,
}

impl ApprovalResponse {
    pub fn is_approved(self) -> bool {
        !matches!(self, Self::Reject)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequestResolved {
    pub request_id: String,
    pub response: ApprovalResponse,
}

/// Everything that travels from orchestrator to observer.
///
/// Encodes as `{"type": <variant name>, "payload": {...}}`. Decoding goes
/// through [`WireRegistry`](super::envelope::WireRegistry).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum WireMessage {
    TurnBegin(TurnBegin),
    StepBegin(StepBegin),
    StepInterrupted(StepInterrupted),
    CompactionBegin(CompactionBegin),
    CompactionEnd(CompactionEnd),
    StatusUpdate(StatusUpdate),
    ContentPart(ContentPart),
    ToolCall(ToolCall),
    ToolCallPart(ToolCallPart),
    ToolResult(ToolResult),
    SubagentEvent(SubagentEvent),
    ApprovalRequestResolved(ApprovalRequestResolved),
    ApprovalRequest(ApprovalRequest),
}

impl WireMessage {
    /// Every tag, in declaration order.
    pub const TAGS: [&'static str; 13] = [
        "TurnBegin",
        "StepBegin",
        "StepInterrupted",
        "CompactionBegin",
        "CompactionEnd",
        "StatusUpdate",
        "ContentPart",
        "ToolCall",
        "ToolCallPart",
        "ToolResult",
        "SubagentEvent",
        "ApprovalRequestResolved",
        "ApprovalRequest",
    ];

    /// The stable tag this message is encoded under.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TurnBegin(_) => "TurnBegin",
            Self::StepBegin(_) => "StepBegin",
            Self::StepInterrupted(_) => "StepInterrupted",
            Self::CompactionBegin(_) => "CompactionBegin",
            Self::CompactionEnd(_) => "CompactionEnd",
            Self::StatusUpdate(_) => "StatusUpdate",
            Self::ContentPart(_) => "ContentPart",
            Self::ToolCall(_) => "ToolCall",
            Self::ToolCallPart(_) => "ToolCallPart",
            Self::ToolResult(_) => "ToolResult",
            Self::SubagentEvent(_) => "SubagentEvent",
            Self::ApprovalRequestResolved(_) => "ApprovalRequestResolved",
            Self::ApprovalRequest(_) => "ApprovalRequest",
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Self::ApprovalRequest(_))
    }

    pub fn is_event(&self) -> bool {
        !self.is_request()
    }

    /// Coalesce an adjacent event, using the same rule as the merge engine.
    pub fn merge_in_place(&mut self, other: &WireMessage) -> bool {
        match (self, other) {
            (Self::ContentPart(part), Self::ContentPart(more)) => part.merge_in_place(more),
            (Self::ToolCall(call), Self::ToolCallPart(part)) => call.merge_in_place(part),
            (Self::ToolCallPart(orphan), Self::ToolCallPart(part)) => orphan.merge_in_place(part),
            _ => false,
        }
    }

    pub fn is_mergeable(&self) -> bool {
        matches!(
            self,
            Self::ContentPart(_) | Self::ToolCall(_) | Self::ToolCallPart(_)
        )
    }
}

impl From<Fragment> for WireMessage {
    fn from(fragment: Fragment) -> Self {
        match fragment {
            Fragment::Content(part) => Self::ContentPart(part),
            Fragment::ToolCall(call) => Self::ToolCall(call),
            Fragment::ToolCallPart(part) => Self::ToolCallPart(part),
        }
    }
}

impl From<ToolResult> for WireMessage {
    fn from(result: ToolResult) -> Self {
        Self::ToolResult(result)
    }
}

impl From<StatusUpdate> for WireMessage {
    fn from(update: StatusUpdate) -> Self {
        Self::StatusUpdate(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn tags_match_type_names() {
        let samples = [
            WireMessage::TurnBegin(TurnBegin {
                user_input: "hi".into(),
            }),
            WireMessage::StepBegin(StepBegin { n: 1 }),
            WireMessage::StepInterrupted(StepInterrupted {}),
            WireMessage::CompactionBegin(CompactionBegin {}),
            WireMessage::CompactionEnd(CompactionEnd {}),
            WireMessage::StatusUpdate(StatusUpdate::default()),
            WireMessage::ContentPart(ContentPart::text("x")),
            WireMessage::ToolCall(ToolCall::new("c1", "ls")),
            WireMessage::ToolCallPart(ToolCallPart::new("{")),
        ];
        for (msg, tag) in samples.iter().zip(WireMessage::TAGS) {
            assert_eq!(msg.type_name(), tag);
            assert_eq!(serde_json::to_value(msg).unwrap()["type"], json!(tag));
        }
    }

    #[test]
    fn empty_payloads_encode_as_objects() {
        let value = serde_json::to_value(WireMessage::StepInterrupted(StepInterrupted {})).unwrap();
        assert_eq!(value, json!({"type": "StepInterrupted", "payload": {}}));
    }

    #[test]
    fn subagent_event_rejects_requests() {
        let request = WireMessage::ApprovalRequest(ApprovalRequest {
            id: "r1".into(),
            tool_call_id: "c1".into(),
            sender: "shell".into(),
            action: "run".into(),
            description: "ls".into(),
            display: Vec::new(),
        });
        assert!(request.is_request());
        assert!(SubagentEvent::new("task", request).is_err());
    }

    #[test]
    fn adjacent_text_events_coalesce() {
        let mut msg = WireMessage::ContentPart(ContentPart::text("Hel"));
        assert!(msg.merge_in_place(&WireMessage::ContentPart(ContentPart::text("lo"))));
        assert!(!msg.merge_in_place(&WireMessage::StepBegin(StepBegin { n: 2 })));
        assert_eq!(msg, WireMessage::ContentPart(ContentPart::text("Hello")));
    }

    #[test]
    fn unknown_display_blocks_survive_decoding() {
        let block: DisplayBlock =
            serde_json::from_value(json!({"type": "chart", "data": 1})).unwrap();
        assert_eq!(block, DisplayBlock::Unknown);
    }
}
