//! Tests for the step coordinator.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{hanging_tool, provider_with, provider_with_fragments, sleepy_tool, CompletionLog};
use pretty_assertions::assert_eq;
use turnwire::error::TurnwireError;
use turnwire::prelude::*;
use turnwire::provider::ScriptStep;
use turnwire::tools::HandleState;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn results_follow_call_order_not_completion_order() {
    let log = CompletionLog::default();
    let toolset = SimpleToolset::new()
        .with_tool(sleepy_tool("a", ms(30), log.clone()))
        .with_tool(sleepy_tool("b", ms(20), log.clone()))
        .with_tool(sleepy_tool("c", ms(10), log.clone()));
    let provider = provider_with_fragments([
        Fragment::text("Running three tools."),
        Fragment::tool_call("call_a", "a", ""),
        Fragment::tool_call("call_b", "b", ""),
        Fragment::tool_call("call_c", "c", ""),
    ]);

    let result = step(
        &provider,
        "system",
        &toolset,
        &[Message::user("go")],
        StepOptions::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let ids: Vec<_> = result.tool_calls().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["call_a", "call_b", "call_c"]);

    let results = result.tool_results().await.unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
    assert_eq!(ids, vec!["call_a", "call_b", "call_c"]);
    assert_eq!(results[0].outcome, ToolOutcome::ok("a"));
    assert_eq!(log.entries(), vec!["c", "b", "a"]);

    // A second collection reuses the resolved handles.
    assert_eq!(result.tool_results().await.unwrap(), results);
}

#[tokio::test]
async fn stream_failure_cancels_dispatched_tools() {
    let dropped = Arc::new(AtomicBool::new(false));
    let toolset = SimpleToolset::new().with_tool(hanging_tool("a", dropped.clone()));
    let provider = provider_with([
        ScriptStep::Fragment(Fragment::tool_call("call_a", "a", "")),
        // The text fragment finalizes call_a, so it is dispatched before the failure.
        ScriptStep::Fragment(Fragment::text("checking")),
        ScriptStep::Delay(ms(10)),
        ScriptStep::Fail("connection reset".into()),
        ScriptStep::Fragment(Fragment::tool_call("call_b", "a", "")),
    ]);
    let resolved = Arc::new(Mutex::new(Vec::new()));
    let sink = resolved.clone();
    let options = StepOptions::new().on_tool_result(Arc::new(move |r: &ToolResult| {
        sink.lock().unwrap().push(r.tool_call_id.clone());
    }));

    let err = step(&provider, "", &toolset, &[], options, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TurnwireError::Provider { .. }));
    assert!(dropped.load(Ordering::SeqCst), "tool task was not torn down");
    assert!(resolved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_drains_tools_before_propagating() {
    let dropped = Arc::new(AtomicBool::new(false));
    let toolset = SimpleToolset::new().with_tool(hanging_tool("a", dropped.clone()));
    let provider = provider_with([
        ScriptStep::Fragment(Fragment::tool_call("call_a", "a", "")),
        ScriptStep::Fragment(Fragment::text("still thinking")),
        ScriptStep::Hang,
    ]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(ms(20)).await;
        trigger.cancel();
    });

    let err = step(&provider, "", &toolset, &[], StepOptions::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnwireError::Cancelled));
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn bad_calls_resolve_immediately_without_aborting_siblings() {
    let log = CompletionLog::default();
    let toolset = SimpleToolset::new().with_tool(sleepy_tool("a", ms(1), log.clone()));
    let provider = provider_with_fragments([
        Fragment::tool_call("call_1", "nope", ""),
        Fragment::tool_call("call_2", "a", "{not json"),
        Fragment::tool_call("call_3", "a", ""),
    ]);

    let result = step(
        &provider,
        "",
        &toolset,
        &[],
        StepOptions::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(matches!(
        result.handle("call_1").unwrap().state(),
        HandleState::Resolved(_)
    ));
    let outcomes: Vec<_> = result
        .tool_results()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.outcome)
        .collect();
    assert!(matches!(outcomes[0], ToolOutcome::NotFound { .. }));
    assert!(matches!(outcomes[1], ToolOutcome::ParseError { .. }));
    assert_eq!(outcomes[2], ToolOutcome::ok("a"));
}

#[tokio::test]
async fn dropping_the_step_result_aborts_pending_tools() {
    let dropped = Arc::new(AtomicBool::new(false));
    let toolset = SimpleToolset::new().with_tool(hanging_tool("a", dropped.clone()));
    let provider = provider_with_fragments([Fragment::tool_call("call_a", "a", "")]);

    let result = step(
        &provider,
        "",
        &toolset,
        &[],
        StepOptions::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    let handle_pending = result.handle("call_a").unwrap().is_pending();
    assert!(handle_pending);
    // Let the tool task start so its guard exists before the abort.
    tokio::time::sleep(ms(5)).await;
    drop(result);

    // Abort is asynchronous; give the runtime a moment to drop the task.
    for _ in 0..10 {
        if dropped.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(ms(5)).await;
    }
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn forwarding_to_wire_publishes_fragments_and_results() {
    let wire = Wire::new();
    let log = CompletionLog::default();
    let toolset = SimpleToolset::new().with_tool(sleepy_tool("a", ms(1), log));
    let provider = provider_with_fragments([
        Fragment::text("Hel"),
        Fragment::text("lo"),
        Fragment::tool_call("call_a", "a", ""),
    ]);

    let result = step(
        &provider,
        "",
        &toolset,
        &[],
        StepOptions::forward_to_wire(wire.soul_side()),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    result.tool_results().await.unwrap();
    wire.shutdown(ShutdownMode::Graceful);

    let mut ui = wire.ui_side(false).await;
    let mut seen = Vec::new();
    while let Ok(msg) = ui.receive().await {
        seen.push(msg.type_name());
    }
    assert_eq!(seen, vec!["ContentPart", "ContentPart", "ToolCall", "ToolResult"]);
}
