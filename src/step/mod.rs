//! Step coordinator: one merge pass plus dispatch of every tool call in it.
//!
//! Tool calls are dispatched the moment the merge engine finalizes them, so
//! tools run while the rest of the stream is still arriving. If the merge
//! pass fails, every handle created so far is cancelled and drained before
//! the failure is returned.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::merge::{generate, FragmentCallback, ToolCallSink};
use crate::provider::ChatProvider;
use crate::tools::{HandleState, ResultHandle, ToolResult, Toolset};
use crate::types::{Fragment, Message, TokenUsage, ToolCall};
use crate::wire::{WireMessage, WireSoulSide};

/// Synchronous listener fired once per tool result, as soon as it resolves.
pub type ToolResultListener = Arc<dyn Fn(&ToolResult) + Send + Sync>;

/// Optional observers for a step.
#[derive(Clone, Default)]
pub struct StepOptions {
    /// Awaited with a copy of every raw fragment, in stream order.
    pub on_fragment: Option<FragmentCallback>,
    /// Fired for every resolved tool result. Not fired on cancellation.
    pub on_tool_result: Option<ToolResultListener>,
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_fragment(mut self, callback: FragmentCallback) -> Self {
        self.on_fragment = Some(callback);
        self
    }

    pub fn on_tool_result(mut self, listener: ToolResultListener) -> Self {
        self.on_tool_result = Some(listener);
        self
    }

    /// Emit every fragment and every tool result onto `wire` as events.
    pub fn forward_to_wire(wire: WireSoulSide) -> Self {
        let fragment_wire = wire.clone();
        let on_fragment: FragmentCallback = Arc::new(move |fragment: Fragment| {
            let wire = fragment_wire.clone();
            async move {
                if let Err(err) = wire.send(WireMessage::from(fragment)) {
                    tracing::debug!(error = %err, "dropping fragment event");
                }
            }
            .boxed()
        });
        let on_tool_result: ToolResultListener = Arc::new(move |result: &ToolResult| {
            if let Err(err) = wire.send(WireMessage::ToolResult(result.clone())) {
                tracing::debug!(error = %err, "dropping tool result event");
            }
        });
        Self {
            on_fragment: Some(on_fragment),
            on_tool_result: Some(on_tool_result),
        }
    }
}

impl std::fmt::Debug for StepOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepOptions")
            .field("on_fragment", &self.on_fragment.is_some())
            .field("on_tool_result", &self.on_tool_result.is_some())
            .finish()
    }
}

/// The outcome of one step: the finalized message and in-flight tool work.
///
/// Owns its handles exclusively. Dropping a `StepResult` cancels any tool
/// execution still pending.
pub struct StepResult {
    pub id: Option<String>,
    pub message: Message,
    pub usage: Option<TokenUsage>,
    tool_calls: Vec<ToolCall>,
    handles: Vec<ResultHandle>,
}

impl StepResult {
    /// Tool calls in the order the model emitted them.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn handles(&self) -> &[ResultHandle] {
        &self.handles
    }

    pub fn handle(&self, tool_call_id: &str) -> Option<&ResultHandle> {
        self.handles
            .iter()
            .find(|h| h.tool_call_id() == tool_call_id)
    }

    /// Await every result in call order, whatever order they completed in.
    ///
    /// Afterwards every still-pending handle is cancelled and drained, on
    /// success and failure alike. Calling this again after success is cheap.
    pub async fn tool_results(&self) -> Result<Vec<ToolResult>> {
        if self.handles.is_empty() {
            return Ok(Vec::new());
        }
        let collected = self.collect().await;
        cancel_and_drain(&self.handles).await;
        collected
    }

    async fn collect(&self) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            results.push(handle.wait().await?);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for StepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepResult")
            .field("id", &self.id)
            .field("message", &self.message)
            .field("usage", &self.usage)
            .field("handles", &self.handles)
            .finish()
    }
}

/// Collects finalized tool calls and dispatches each one immediately.
struct Dispatcher<'a> {
    toolset: &'a dyn Toolset,
    on_tool_result: Option<ToolResultListener>,
    calls: Vec<ToolCall>,
    handles: Vec<ResultHandle>,
}

#[async_trait]
impl<'a> ToolCallSink for Dispatcher<'a> {
    async fn on_tool_call(&mut self, call: &ToolCall) {
        if self.calls.iter().any(|c| c.id == call.id) {
            tracing::warn!(tool_call_id = %call.id, "duplicate tool call id in one step");
        }
        let handle = self.toolset.handle(call).into_handle();
        if let Some(listener) = &self.on_tool_result {
            let listener = listener.clone();
            handle.on_complete(move |state| {
                if let HandleState::Resolved(result) = state {
                    listener(result);
                }
            });
        }
        self.calls.push(call.clone());
        self.handles.push(handle);
    }
}

/// Run one step: generate, dispatching tool calls as they finalize.
pub async fn step(
    provider: &dyn ChatProvider,
    system_prompt: &str,
    toolset: &dyn Toolset,
    history: &[Message],
    options: StepOptions,
    cancel: &CancellationToken,
) -> Result<StepResult> {
    let tools = toolset.tools();
    let mut dispatcher = Dispatcher {
        toolset,
        on_tool_result: options.on_tool_result.clone(),
        calls: Vec::new(),
        handles: Vec::new(),
    };

    let generated = generate(
        provider,
        system_prompt,
        &tools,
        history,
        options.on_fragment.as_ref(),
        Some(&mut dispatcher),
        cancel,
    )
    .await;

    match generated {
        Ok(result) => {
            tracing::debug!(
                tool_calls = dispatcher.calls.len(),
                "step finished streaming"
            );
            Ok(StepResult {
                id: result.id,
                message: result.message,
                usage: result.usage,
                tool_calls: dispatcher.calls,
                handles: dispatcher.handles,
            })
        }
        Err(err) => {
            tracing::debug!(
                error = %err,
                in_flight = dispatcher.handles.len(),
                "step failed; cancelling dispatched tools"
            );
            cancel_and_drain(&dispatcher.handles).await;
            Err(err)
        }
    }
}

async fn cancel_and_drain(handles: &[ResultHandle]) {
    for handle in handles {
        handle.cancel();
    }
    for handle in handles {
        handle.drain().await;
    }
}
