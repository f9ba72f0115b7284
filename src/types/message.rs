//! Message types for model communication.

use base64::Engine;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A finalized unit of message content.
///
/// Content parts are append-only once they land in a [`Message`]; the merge
/// engine only ever grows the pending (not yet finalized) part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Think {
        think: String,
        /// Encrypted thinking content, or a signature.
        #[serde(default)]
        encrypted: Option<String>,
    },
    Media(MediaPart),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn think(think: impl Into<String>) -> Self {
        Self::Think {
            think: think.into(),
            encrypted: None,
        }
    }

    /// Think content carrying a terminal encrypted stamp.
    pub fn think_encrypted(think: impl Into<String>, encrypted: impl Into<String>) -> Self {
        Self::Think {
            think: think.into(),
            encrypted: Some(encrypted.into()),
        }
    }

    /// Stable short name of the part kind, as used in its `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Think { .. } => "think",
            Self::Media(_) => "media",
        }
    }

    /// Absorb `other` into `self` if both are the same mergeable kind.
    ///
    /// Text concatenates. Think concatenates until it has been stamped with
    /// `encrypted`; a stamped think part accepts nothing further. Media
    /// never merges.
    pub fn merge_in_place(&mut self, other: &ContentPart) -> bool {
        match (self, other) {
            (Self::Text { text }, Self::Text { text: more }) => {
                text.push_str(more);
                true
            }
            (
                Self::Think { think, encrypted },
                Self::Think {
                    think: more,
                    encrypted: stamp,
                },
            ) => {
                if encrypted.is_some() {
                    return false;
                }
                think.push_str(more);
                if stamp.is_some() {
                    *encrypted = stamp.clone();
                }
                true
            }
            _ => false,
        }
    }
}

/// Kind of media referenced by a [`MediaPart`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

/// Media referenced by URL. The URL may be a `data:` URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaPart {
    pub kind: MediaKind,
    pub url: String,
    /// Lets the model tell several media items apart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl MediaPart {
    pub fn new(kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            id: None,
        }
    }

    /// Embed raw bytes as a base64 `data:` URI.
    pub fn from_bytes(kind: MediaKind, mime_type: &str, bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::new(kind, format!("data:{mime_type};base64,{encoded}"))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A tool call requested by the model.
///
/// `arguments` is the raw accumulated argument text. It is only parsed when
/// the call is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    /// Append a continuation if it targets this call.
    ///
    /// A part without an id always targets the most recently started call,
    /// which is the pending one whenever this is asked.
    pub fn merge_in_place(&mut self, part: &ToolCallPart) -> bool {
        if let Some(id) = &part.tool_call_id {
            if id != &self.id {
                return false;
            }
        }
        if let Some(more) = &part.arguments_part {
            self.arguments.get_or_insert_with(String::new).push_str(more);
        }
        true
    }

    /// Raw argument text, `{}` if the model sent none.
    pub fn arguments_or_empty(&self) -> &str {
        match self.arguments.as_deref() {
            Some(args) if !args.trim().is_empty() => args,
            _ => "{}",
        }
    }
}

/// A continuation of a streamed tool call's arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolCallPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub arguments_part: Option<String>,
}

impl ToolCallPart {
    pub fn new(arguments_part: impl Into<String>) -> Self {
        Self {
            tool_call_id: None,
            arguments_part: Some(arguments_part.into()),
        }
    }

    pub fn for_call(tool_call_id: impl Into<String>, arguments_part: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            arguments_part: Some(arguments_part.into()),
        }
    }

    /// Continuations only chain onto each other when they agree on the target.
    pub fn merge_in_place(&mut self, other: &ToolCallPart) -> bool {
        if other.tool_call_id.is_some() && other.tool_call_id != self.tool_call_id {
            return false;
        }
        if let Some(more) = &other.arguments_part {
            self.arguments_part
                .get_or_insert_with(String::new)
                .push_str(more);
        }
        true
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

impl Message {
    /// An empty message with the given role.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            name: None,
            content: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
            partial: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System).with_content(ContentPart::text(text))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User).with_content(ContentPart::text(text))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant).with_content(ContentPart::text(text))
    }

    /// A tool-role message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: Vec<ContentPart>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            content,
            ..Self::new(Role::Tool)
        }
    }

    pub fn with_content(mut self, part: ContentPart) -> Self {
        self.content.push(part);
        self
    }

    /// Whether the message carries neither content nor tool calls.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.as_ref().map_or(true, Vec::is_empty)
    }

    /// Tool calls in emission order (empty if none).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Concatenate all text parts, joined by `sep`.
    pub fn extract_text(&self, sep: &str) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Render content for logs: text verbatim, other parts as `[kind]`.
    pub fn stringify(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                other => format!("[{}]", other.kind()),
            })
            .collect()
    }
}
