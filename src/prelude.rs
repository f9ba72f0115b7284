//! Convenience re-exports for common use.

pub use crate::approval::Approval;
pub use crate::config::TurnwireConfig;
pub use crate::error::{Result, TurnwireError};
pub use crate::merge::{generate, merge_stream};
pub use crate::provider::{ChatProvider, StreamedMessage};
pub use crate::step::{step, StepOptions, StepResult};
pub use crate::tools::{
    FnTool, HandleResult, ResultHandle, SimpleToolset, Tool, ToolArguments, ToolCallContext,
    ToolOutcome, ToolParameters, ToolResult, Toolset,
};
pub use crate::types::{ContentPart, Fragment, GenerationResult, Message, Role, ToolCall};
pub use crate::wire::{ShutdownMode, Wire, WireMessage, WireSoulSide, WireUISide};
pub use tokio_util::sync::CancellationToken;
