//! Tool outcomes and results.

use serde::{Deserialize, Serialize};

use crate::error::TurnwireError;
use crate::types::{ContentPart, Message};

/// What a tool produced: plain text or a list of content parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for ToolOutput {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ToolOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }

    fn into_parts(self) -> Vec<ContentPart> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![ContentPart::text(text)],
            Self::Parts(parts) => parts,
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// The outcome of one tool invocation.
///
/// Every fault of a single call ends up here instead of propagating, so one
/// failing tool never aborts the step or its sibling calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok {
        #[serde(default)]
        output: ToolOutput,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Short summary for display.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brief: Option<String>,
    },
    /// The tool ran and reported a failure itself.
    Error {
        #[serde(default)]
        output: ToolOutput,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brief: Option<String>,
    },
    NotFound {
        name: String,
    },
    ParseError {
        message: String,
    },
    RuntimeError {
        message: String,
    },
    Rejected,
    Timeout {
        message: String,
    },
}

impl ToolOutcome {
    pub fn ok(output: impl Into<ToolOutput>) -> Self {
        Self::Ok {
            output: output.into(),
            message: None,
            brief: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            output: ToolOutput::default(),
            message: message.into(),
            brief: None,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Ok { .. })
    }

    /// Model-facing explanation; `None` for a plain success.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Ok { message, .. } => message.clone(),
            Self::Error { message, .. } => Some(message.clone()),
            Self::NotFound { name } => Some(format!("Tool `{name}` not found")),
            Self::ParseError { message } => {
                Some(format!("Error parsing JSON arguments: {message}"))
            }
            Self::RuntimeError { message } => Some(format!("Error running tool: {message}")),
            Self::Rejected => Some(
                "The tool call is rejected by the user. \
                 Stop what you are doing and wait for the user to tell you how to proceed."
                    .to_string(),
            ),
            Self::Timeout { message } => Some(message.clone()),
        }
    }

    /// Short summary for display.
    pub fn brief(&self) -> Option<String> {
        match self {
            Self::Ok { brief, .. } | Self::Error { brief, .. } => brief.clone(),
            Self::NotFound { .. } => Some("Tool not found".into()),
            Self::ParseError { .. } => Some("Invalid arguments".into()),
            Self::RuntimeError { .. } => Some("Tool runtime error".into()),
            Self::Rejected => Some("Rejected by user".into()),
            Self::Timeout { .. } => Some("Timeout".into()),
        }
    }

    /// Lift a failed outcome back into the error taxonomy.
    pub fn into_error(self) -> Result<ToolOutput, TurnwireError> {
        match self {
            Self::Ok { output, .. } => Ok(output),
            Self::Error { message, .. } | Self::RuntimeError { message } => {
                Err(TurnwireError::ToolRuntime(message))
            }
            Self::NotFound { name } => Err(TurnwireError::ToolNotFound(name)),
            Self::ParseError { message } => Err(TurnwireError::ToolParse(message)),
            Self::Rejected => Err(TurnwireError::ToolRejected),
            Self::Timeout { message } => Err(TurnwireError::ToolTimeout(message)),
        }
    }
}

/// A tool outcome tied to the call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn new(tool_call_id: impl Into<String>, outcome: ToolOutcome) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome,
        }
    }

    /// Render as the `tool` message fed back to the model.
    pub fn to_message(&self) -> Message {
        let mut content = Vec::new();
        let output = match &self.outcome {
            ToolOutcome::Ok { output, .. } | ToolOutcome::Error { output, .. } => output.clone(),
            _ => ToolOutput::default(),
        };
        if self.outcome.is_error() {
            let mut message = self.outcome.message().unwrap_or_default();
            if matches!(self.outcome, ToolOutcome::RuntimeError { .. }) {
                message.push_str(
                    "\nThis is an unexpected error and the tool is probably not working.",
                );
            }
            content.push(system(&format!("ERROR: {message}")));
            content.extend(output.into_parts());
        } else {
            if let Some(message) = self.outcome.message() {
                content.push(system(&message));
            }
            content.extend(output.into_parts());
            if content.is_empty() {
                content.push(system("Tool output is empty."));
            }
        }
        Message::tool(self.tool_call_id.clone(), content)
    }
}

fn system(text: &str) -> ContentPart {
    ContentPart::text(format!("<system>{text}</system>"))
}
