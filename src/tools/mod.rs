//! Tool system: descriptors, dispatch, and result handles.

pub mod arguments;
pub mod handle;
pub mod outcome;
pub mod tool;
pub mod toolset;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use handle::{CompletionListener, HandleState, ResultHandle};
pub use outcome::{ToolOutcome, ToolOutput, ToolResult};
pub use tool::{FnTool, Tool, ToolCallContext};
pub use toolset::{HandleResult, SimpleToolset, Toolset};
pub use types::{ParameterBuilder, ToolDescriptor, ToolParameters};
