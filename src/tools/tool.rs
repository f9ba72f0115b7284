//! Tool trait, closure-based tool wrapper, and the per-call context.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::outcome::ToolOutcome;
use super::types::{ToolDescriptor, ToolParameters};
use crate::approval::Approval;
use crate::error::{Result, TurnwireError};
use crate::types::ToolCall;
use crate::wire::{DisplayBlock, SubagentEvent, WireMessage, WireSoulSide};

/// Context handed to a tool for one invocation.
///
/// This is the only way a tool learns which call it is serving; nothing is
/// looked up from ambient state.
#[derive(Clone)]
pub struct ToolCallContext {
    call: ToolCall,
    wire: Option<WireSoulSide>,
    approval: Option<Arc<Approval>>,
}

impl ToolCallContext {
    pub fn new(call: ToolCall) -> Self {
        Self {
            call,
            wire: None,
            approval: None,
        }
    }

    pub fn with_wire(mut self, wire: WireSoulSide) -> Self {
        self.wire = Some(wire);
        self
    }

    pub fn with_approval(mut self, approval: Arc<Approval>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn tool_call(&self) -> &ToolCall {
        &self.call
    }

    pub fn tool_call_id(&self) -> &str {
        &self.call.id
    }

    pub fn wire(&self) -> Option<&WireSoulSide> {
        self.wire.as_ref()
    }

    /// Emit a message on the wire.
    pub fn send(&self, msg: WireMessage) -> Result<()> {
        self.wire
            .as_ref()
            .ok_or_else(|| TurnwireError::Configuration("tool context has no wire".into()))?
            .send(msg)
    }

    /// Forward an event from a nested agent, tagged with this call's id.
    pub fn send_subagent_event(&self, event: WireMessage) -> Result<()> {
        let event = SubagentEvent::new(self.call.id.clone(), event)?;
        self.send(WireMessage::SubagentEvent(event))
    }

    /// Ask the observer for permission to perform `action`.
    ///
    /// Resolves to `true` when approved (now or earlier for the session).
    pub async fn request_approval(
        &self,
        action: &str,
        description: &str,
        display: Vec<DisplayBlock>,
    ) -> Result<bool> {
        let approval = self
            .approval
            .as_ref()
            .ok_or_else(|| TurnwireError::Configuration("tool context has no approval".into()))?;
        approval
            .request(self, &self.call.name, action, description, display)
            .await
    }
}

impl std::fmt::Debug for ToolCallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallContext")
            .field("call", &self.call)
            .field("wire", &self.wire.is_some())
            .field("approval", &self.approval.is_some())
            .finish()
    }
}

/// Core tool trait. Implement to create custom tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    /// What gets advertised to the provider.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }

    /// Run the tool. An `Err` is reported to the model as a runtime error.
    async fn call(&self, args: ToolArguments, ctx: ToolCallContext) -> Result<ToolOutcome>;
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolOutcome>> + Send>>;

type ToolHandler = dyn Fn(ToolArguments, ToolCallContext) -> ToolFuture + Send + Sync;

/// Closure-based tool for quick tool creation.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutcome>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn call(&self, args: ToolArguments, ctx: ToolCallContext) -> Result<ToolOutcome> {
        (self.handler)(args, ctx).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
