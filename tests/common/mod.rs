//! Shared test helpers: scripted providers and instrumented tools.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use turnwire::provider::{ScriptStep, ScriptedProvider, ScriptedStream};
use turnwire::tools::{FnTool, Tool, ToolOutcome, ToolParameters};
use turnwire::types::Fragment;

/// A provider that will play back exactly one stream.
pub fn provider_with(steps: impl IntoIterator<Item = ScriptStep>) -> ScriptedProvider {
    let provider = ScriptedProvider::new("scripted-model");
    provider.push(ScriptedStream::new(steps));
    provider
}

pub fn provider_with_fragments(fragments: impl IntoIterator<Item = Fragment>) -> ScriptedProvider {
    provider_with(fragments.into_iter().map(ScriptStep::from))
}

/// Records the order in which tools finished.
#[derive(Clone, Default)]
pub struct CompletionLog(Arc<Mutex<Vec<String>>>);

impl CompletionLog {
    pub fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A tool that sleeps for `delay`, logs its name, and returns it.
pub fn sleepy_tool(name: &str, delay: Duration, log: CompletionLog) -> Arc<dyn Tool> {
    let tool_name = name.to_string();
    Arc::new(FnTool::new(
        name,
        "Sleeps, then reports its own name.",
        ToolParameters::empty(),
        move |_args, _ctx| {
            let name = tool_name.clone();
            let log = log.clone();
            async move {
                tokio::time::sleep(delay).await;
                log.push(&name);
                Ok(ToolOutcome::ok(name))
            }
        },
    ))
}

/// Flips a flag when dropped; lets a test observe that a task was torn down.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A tool that never finishes. `dropped` is set once its task is aborted.
pub fn hanging_tool(name: &str, dropped: Arc<AtomicBool>) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        name,
        "Never finishes.",
        ToolParameters::empty(),
        move |_args, _ctx| {
            let guard = DropFlag(dropped.clone());
            async move {
                let _guard = guard;
                futures::future::pending::<()>().await;
                Ok(ToolOutcome::ok("unreachable"))
            }
        },
    ))
}
