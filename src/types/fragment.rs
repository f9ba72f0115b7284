//! Streamed fragments and the merge-in-place rule shared by the merge engine
//! and the wire consumer.

use super::message::{ContentPart, Message, ToolCall, ToolCallPart};

/// One partial update from a live provider stream.
///
/// A `ToolCall` fragment opens a new call (it carries id and name, and possibly
/// the first slice of arguments); `ToolCallPart` fragments continue it.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Content(ContentPart),
    ToolCall(ToolCall),
    ToolCallPart(ToolCallPart),
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Content(ContentPart::text(text))
    }

    pub fn think(think: impl Into<String>) -> Self {
        Self::Content(ContentPart::think(think))
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: &str) -> Self {
        let call = ToolCall::new(id, name);
        Self::ToolCall(if arguments.is_empty() {
            call
        } else {
            call.with_arguments(arguments)
        })
    }

    pub fn tool_call_part(arguments_part: impl Into<String>) -> Self {
        Self::ToolCallPart(ToolCallPart::new(arguments_part))
    }

    /// Try to absorb `other` into this (pending) fragment.
    ///
    /// Succeeds only for the same kind and the same logical target. On
    /// failure nothing is modified and the caller must finalize `self`.
    pub fn merge_in_place(&mut self, other: &Fragment) -> bool {
        match (self, other) {
            (Self::Content(part), Self::Content(more)) => part.merge_in_place(more),
            (Self::ToolCall(call), Self::ToolCallPart(part)) => call.merge_in_place(part),
            (Self::ToolCallPart(orphan), Self::ToolCallPart(part)) => orphan.merge_in_place(part),
            _ => false,
        }
    }

    /// Append this fragment to `message` as a finalized unit.
    ///
    /// Returns `false` for an orphaned continuation, which has no call to
    /// attach to and is dropped.
    pub fn append_to(self, message: &mut Message) -> bool {
        match self {
            Self::Content(part) => {
                message.content.push(part);
                true
            }
            Self::ToolCall(call) => {
                message.tool_calls.get_or_insert_with(Vec::new).push(call);
                true
            }
            Self::ToolCallPart(_) => false,
        }
    }
}

impl From<ContentPart> for Fragment {
    fn from(part: ContentPart) -> Self {
        Self::Content(part)
    }
}

impl From<ToolCall> for Fragment {
    fn from(call: ToolCall) -> Self {
        Self::ToolCall(call)
    }
}

impl From<ToolCallPart> for Fragment {
    fn from(part: ToolCallPart) -> Self {
        Self::ToolCallPart(part)
    }
}
