//! Chat provider seam.
//!
//! Concrete backend connectors live outside this crate. They translate their
//! wire format into the canonical [`Fragment`] stream consumed by the merge
//! engine.

pub mod scripted;

pub use scripted::{ScriptStep, ScriptedProvider, ScriptedStream};

use async_trait::async_trait;
use futures::Stream;

use crate::error::TurnwireError;
use crate::tools::ToolDescriptor;
use crate::types::{Fragment, Message, TokenUsage};

/// A live, single-pass fragment stream for one generation.
///
/// The stream is not restartable. `usage` is only meaningful once the stream
/// has been exhausted.
pub trait StreamedMessage: Stream<Item = Result<Fragment, TurnwireError>> + Send + Unpin {
    /// Provider-assigned id of the generated message, if any.
    fn id(&self) -> Option<String>;

    /// Token usage, available after the stream is exhausted.
    fn usage(&self) -> Option<TokenUsage>;
}

/// Core trait implemented by chat providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g., "kimi", "scripted").
    fn name(&self) -> &str;

    /// The model this provider instance serves.
    fn model_name(&self) -> &str;

    /// Open a streamed generation for the given prompt, tools and history.
    async fn generate(
        &self,
        system_prompt: &str,
        tools: &[ToolDescriptor],
        history: &[Message],
    ) -> Result<Box<dyn StreamedMessage>, TurnwireError>;
}
