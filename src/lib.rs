//! Turnwire: streaming turn orchestration for language-model agents.
//!
//! Turns a live fragment stream from a chat provider into a finalized
//! message, dispatches the tool calls it contains as concurrent tasks, and
//! publishes everything that happens as typed events on a [`wire::Wire`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnwire::prelude::*;
//! use turnwire::provider::{ScriptedProvider, ScriptedStream};
//! use turnwire::types::Fragment;
//!
//! # async fn example() -> turnwire::error::Result<()> {
//! let provider = ScriptedProvider::new("demo");
//! provider.push(ScriptedStream::from_fragments([
//!     Fragment::text("Listing files."),
//!     Fragment::tool_call("call_1", "echo", r#"{"text":"hi"}"#),
//! ]));
//!
//! let toolset = SimpleToolset::new().with_tool(Arc::new(FnTool::new(
//!     "echo",
//!     "Echo the text argument.",
//!     ToolParameters::object().string("text", "what to echo", true).build(),
//!     |args, _ctx| async move { Ok(ToolOutcome::ok(args.get_str("text")?.to_string())) },
//! )));
//!
//! let cancel = CancellationToken::new();
//! let result = step(&provider, "", &toolset, &[], StepOptions::new(), &cancel).await?;
//! for tool_result in result.tool_results().await? {
//!     println!("{:?}", tool_result.to_message());
//! }
//! # Ok(())
//! # }
//! ```

pub mod approval;
pub mod config;
pub mod error;
pub mod merge;
pub mod prelude;
pub mod provider;
pub mod step;
pub mod tools;
pub mod types;
pub mod util;
pub mod wire;
