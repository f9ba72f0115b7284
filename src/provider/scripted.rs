//! Scripted provider for replaying canned fragment sequences.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::Stream;

use super::{ChatProvider, StreamedMessage};
use crate::error::TurnwireError;
use crate::tools::ToolDescriptor;
use crate::types::{Fragment, Message, TokenUsage};

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield a fragment.
    Fragment(Fragment),
    /// Sleep before the next step.
    Delay(Duration),
    /// Fail the stream with a provider error.
    Fail(String),
    /// Never yield again.
    Hang,
}

impl From<Fragment> for ScriptStep {
    fn from(fragment: Fragment) -> Self {
        Self::Fragment(fragment)
    }
}

/// A [`StreamedMessage`] that plays back a fixed script.
pub struct ScriptedStream {
    id: Option<String>,
    usage: Option<TokenUsage>,
    exhausted: Arc<AtomicBool>,
    inner: BoxStream<'static, Result<Fragment, TurnwireError>>,
}

impl ScriptedStream {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        let steps: Vec<ScriptStep> = steps.into_iter().collect();
        let exhausted = Arc::new(AtomicBool::new(false));
        let done = exhausted.clone();
        let inner = async_stream::stream! {
            for step in steps {
                match step {
                    ScriptStep::Fragment(fragment) => yield Ok(fragment),
                    ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                    ScriptStep::Fail(message) => {
                        yield Err(TurnwireError::provider("scripted", message));
                        return;
                    }
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                }
            }
            done.store(true, Ordering::SeqCst);
        };
        Self {
            id: None,
            usage: None,
            exhausted,
            inner: Box::pin(inner),
        }
    }

    /// Shorthand for a script made only of fragments.
    pub fn from_fragments(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        Self::new(fragments.into_iter().map(ScriptStep::Fragment))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

impl Stream for ScriptedStream {
    type Item = Result<Fragment, TurnwireError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl StreamedMessage for ScriptedStream {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn usage(&self) -> Option<TokenUsage> {
        if self.exhausted.load(Ordering::SeqCst) {
            self.usage
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ScriptedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedStream")
            .field("id", &self.id)
            .field("usage", &self.usage)
            .finish()
    }
}

/// A provider that hands out queued scripts, one per `generate` call.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    model_name: String,
    scripts: Mutex<VecDeque<ScriptedStream>>,
    history_lengths: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    /// Queue the stream returned by the next `generate` call.
    pub fn push(&self, stream: ScriptedStream) {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(stream);
    }

    /// History lengths seen by each `generate` call so far.
    pub fn history_lengths(&self) -> Vec<usize> {
        self.history_lengths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _tools: &[ToolDescriptor],
        history: &[Message],
    ) -> Result<Box<dyn StreamedMessage>, TurnwireError> {
        self.history_lengths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(history.len());
        let next = self
            .scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match next {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(TurnwireError::provider(
                self.name(),
                "no scripted response queued",
            )),
        }
    }
}
