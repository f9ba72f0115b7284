//! Toolsets: resolving a finalized tool call into a result or a handle.

use std::sync::Arc;

use super::arguments::ToolArguments;
use super::handle::ResultHandle;
use super::outcome::{ToolOutcome, ToolResult};
use super::tool::{Tool, ToolCallContext};
use super::types::ToolDescriptor;
use super::validation::check_arguments;
use crate::approval::Approval;
use crate::error::TurnwireError;
use crate::types::ToolCall;
use crate::wire::WireSoulSide;

/// What a toolset makes of one tool call.
#[derive(Debug)]
pub enum HandleResult {
    /// Settled without running anything (unknown tool, bad arguments).
    Immediate(ToolResult),
    /// Work launched as an independent task.
    Pending(ResultHandle),
}

impl HandleResult {
    /// Normalize into a handle; immediate results become resolved handles.
    pub fn into_handle(self) -> ResultHandle {
        match self {
            Self::Immediate(result) => ResultHandle::resolved(result),
            Self::Pending(handle) => handle,
        }
    }
}

/// The tool capability consumed by the step coordinator.
pub trait Toolset: Send + Sync {
    /// Descriptors advertised to the provider.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Dispatch one call. Must not block; real work goes into a handle.
    fn handle(&self, call: &ToolCall) -> HandleResult;
}

/// A toolset backed by a list of [`Tool`] objects.
#[derive(Default)]
pub struct SimpleToolset {
    tools: Vec<Arc<dyn Tool>>,
    wire: Option<WireSoulSide>,
    approval: Option<Arc<Approval>>,
}

impl SimpleToolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any earlier tool with the same name.
    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.add(tool);
        self
    }

    /// Wire handed to every tool context.
    pub fn with_wire(mut self, wire: WireSoulSide) -> Self {
        self.wire = Some(wire);
        self
    }

    /// Approval collaborator handed to every tool context.
    pub fn with_approval(mut self, approval: Arc<Approval>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    fn context(&self, call: &ToolCall) -> ToolCallContext {
        let mut ctx = ToolCallContext::new(call.clone());
        if let Some(wire) = &self.wire {
            ctx = ctx.with_wire(wire.clone());
        }
        if let Some(approval) = &self.approval {
            ctx = ctx.with_approval(approval.clone());
        }
        ctx
    }
}

impl Toolset for SimpleToolset {
    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    fn handle(&self, call: &ToolCall) -> HandleResult {
        let Some(tool) = self.find(&call.name).cloned() else {
            tracing::debug!(tool = %call.name, tool_call_id = %call.id, "tool not found");
            return HandleResult::Immediate(ToolResult::new(
                call.id.clone(),
                ToolOutcome::NotFound {
                    name: call.name.clone(),
                },
            ));
        };

        let args = match ToolArguments::parse(call.arguments_or_empty()) {
            Ok(args) => args,
            Err(err) => {
                let message = match err {
                    TurnwireError::ToolParse(message) => message,
                    other => other.to_string(),
                };
                return HandleResult::Immediate(ToolResult::new(
                    call.id.clone(),
                    ToolOutcome::ParseError { message },
                ));
            }
        };
        if let Err(violation) = check_arguments(args.raw(), &tool.parameters().schema) {
            return HandleResult::Immediate(ToolResult::new(
                call.id.clone(),
                ToolOutcome::ParseError {
                    message: violation.to_string(),
                },
            ));
        }

        tracing::debug!(tool = %call.name, tool_call_id = %call.id, "dispatching tool call");
        let ctx = self.context(call);
        let call_id = call.id.clone();
        HandleResult::Pending(ResultHandle::spawn(call.id.clone(), async move {
            let outcome = match tool.call(args, ctx).await {
                Ok(outcome) => outcome,
                Err(err) => ToolOutcome::RuntimeError {
                    message: err.to_string(),
                },
            };
            ToolResult::new(call_id, outcome)
        }))
    }
}

impl std::fmt::Debug for SimpleToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleToolset")
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}
