//! The outcome of a single merged generation.

use serde::{Deserialize, Serialize};

use super::message::Message;
use super::usage::TokenUsage;

/// A finalized assistant message plus the stream's id and usage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}
