//! Merge engine: folds a live fragment stream into one finalized message.
//!
//! Exactly one fragment is pending at any time. Each incoming fragment is
//! first offered to the pending one via [`Fragment::merge_in_place`]; if that
//! fails, the pending fragment is finalized into the message and the incoming
//! fragment takes its place. The stream end flushes whatever is pending.
//!
//! Both callbacks are awaited in stream order before the next fragment is
//! pulled, so a slow observer slows down consumption of the provider stream.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TurnwireError};
use crate::provider::{ChatProvider, StreamedMessage};
use crate::tools::ToolDescriptor;
use crate::types::{Fragment, GenerationResult, Message, Role, ToolCall};

/// Async observer of raw fragments, called with a copy of each one.
pub type FragmentCallback = Arc<dyn Fn(Fragment) -> BoxFuture<'static, ()> + Send + Sync>;

/// Receives every tool call at the instant it is finalized.
#[async_trait]
pub trait ToolCallSink: Send {
    async fn on_tool_call(&mut self, call: &ToolCall);
}

/// Open a generation on `provider` and merge its stream.
pub async fn generate(
    provider: &dyn ChatProvider,
    system_prompt: &str,
    tools: &[ToolDescriptor],
    history: &[Message],
    on_fragment: Option<&FragmentCallback>,
    on_tool_call: Option<&mut dyn ToolCallSink>,
    cancel: &CancellationToken,
) -> Result<GenerationResult> {
    tracing::trace!(
        provider = provider.name(),
        model = provider.model_name(),
        history_len = history.len(),
        "generating"
    );
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TurnwireError::Cancelled),
        stream = provider.generate(system_prompt, tools, history) => stream?,
    };
    merge_stream(&mut *stream, on_fragment, on_tool_call, cancel).await
}

/// Merge an already-open stream into a [`GenerationResult`].
///
/// Fails with [`TurnwireError::EmptyResponse`] when the stream produced
/// neither content nor tool calls, and with [`TurnwireError::Cancelled`] as
/// soon as `cancel` fires while waiting for the next fragment.
pub async fn merge_stream<S>(
    stream: &mut S,
    on_fragment: Option<&FragmentCallback>,
    mut on_tool_call: Option<&mut dyn ToolCallSink>,
    cancel: &CancellationToken,
) -> Result<GenerationResult>
where
    S: StreamedMessage + ?Sized,
{
    let mut message = Message::new(Role::Assistant);
    let mut pending: Option<Fragment> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TurnwireError::Cancelled),
            next = stream.next() => next,
        };
        let Some(fragment) = next else { break };
        let fragment = fragment?;
        tracing::trace!(?fragment, "received fragment");

        if let Some(callback) = on_fragment {
            callback(fragment.clone()).await;
        }

        match pending.as_mut() {
            None => pending = Some(fragment),
            Some(current) => {
                if !current.merge_in_place(&fragment) {
                    if let Some(done) = pending.replace(fragment) {
                        finalize(done, &mut message, &mut on_tool_call).await;
                    }
                }
            }
        }
    }

    if let Some(done) = pending.take() {
        finalize(done, &mut message, &mut on_tool_call).await;
    }

    if message.is_empty() {
        return Err(TurnwireError::EmptyResponse);
    }

    Ok(GenerationResult {
        id: stream.id(),
        message,
        usage: stream.usage(),
    })
}

async fn finalize(
    fragment: Fragment,
    message: &mut Message,
    on_tool_call: &mut Option<&mut dyn ToolCallSink>,
) {
    let call = match &fragment {
        Fragment::ToolCall(call) => Some(call.clone()),
        _ => None,
    };
    if !fragment.append_to(message) {
        tracing::warn!("dropping orphaned tool call continuation");
        return;
    }
    if let (Some(call), Some(sink)) = (call, on_tool_call.as_mut()) {
        sink.on_tool_call(&call).await;
    }
}
