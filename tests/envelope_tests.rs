//! Tests for the envelope codec.

use pretty_assertions::assert_eq;
use serde_json::json;
use turnwire::error::TurnwireError;
use turnwire::tools::{ToolOutcome, ToolResult};
use turnwire::types::{ContentPart, TokenUsage};
use turnwire::wire::*;

fn round_trip(msg: &WireMessage) -> WireMessage {
    let registry = WireRegistry::new();
    registry.decode_str(&encode(msg).unwrap()).unwrap()
}

#[test]
fn status_update_round_trips() {
    let msg = WireMessage::StatusUpdate(StatusUpdate {
        context_usage: Some(0.42),
        ..Default::default()
    });
    let encoded: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
    assert_eq!(
        encoded,
        json!({"type": "StatusUpdate", "payload": {"context_usage": 0.42}})
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn unknown_variant_fails_only_that_decode() {
    let registry = WireRegistry::new();
    let err = registry
        .decode_str(r#"{"type": "HologramBegin", "payload": {}}"#)
        .unwrap_err();
    assert!(matches!(err, TurnwireError::UnknownWireVariant(tag) if tag == "HologramBegin"));

    let ok = registry.decode_str(r#"{"type": "StepBegin", "payload": {"n": 2}}"#);
    assert_eq!(ok.unwrap(), WireMessage::StepBegin(StepBegin { n: 2 }));
}

#[test]
fn subagent_event_keeps_the_nested_tag() {
    let inner = WireMessage::ContentPart(ContentPart::text("from the subagent"));
    let msg = WireMessage::SubagentEvent(SubagentEvent::new("task_1", inner.clone()).unwrap());

    let encoded: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
    assert_eq!(
        encoded,
        json!({
            "type": "SubagentEvent",
            "payload": {
                "task_tool_call_id": "task_1",
                "event": {
                    "type": "ContentPart",
                    "payload": {"type": "text", "text": "from the subagent"}
                }
            }
        })
    );
    let WireMessage::SubagentEvent(decoded) = round_trip(&msg) else {
        panic!("expected a SubagentEvent");
    };
    assert_eq!(*decoded.event, inner);
}

#[test]
fn nested_requests_are_invalid_payloads() {
    let raw = json!({
        "type": "SubagentEvent",
        "payload": {
            "task_tool_call_id": "task_1",
            "event": {
                "type": "ApprovalRequest",
                "payload": {
                    "id": "r1", "tool_call_id": "c1", "sender": "shell",
                    "action": "run", "description": "ls"
                }
            }
        }
    });
    let err = WireRegistry::new().decode_value(raw).unwrap_err();
    assert!(matches!(err, TurnwireError::InvalidWirePayload { tag, .. } if tag == "SubagentEvent"));
}

#[test]
fn tool_results_and_approvals_round_trip() {
    let messages = [
        WireMessage::ToolResult(ToolResult::new(
            "c1",
            ToolOutcome::Timeout {
                message: "too slow".into(),
            },
        )),
        WireMessage::ApprovalRequest(ApprovalRequest {
            id: "r1".into(),
            tool_call_id: "c1".into(),
            sender: "edit".into(),
            action: "edit file".into(),
            description: "update README".into(),
            display: vec![
                DisplayBlock::diff("README.md", "old", "new"),
                DisplayBlock::Todo {
                    items: vec![TodoItem {
                        title: "write docs".into(),
                        status: TodoStatus::InProgress,
                    }],
                },
            ],
        }),
        WireMessage::ApprovalRequestResolved(ApprovalRequestResolved {
            request_id: "r1".into(),
            response: ApprovalResponse::ApproveForSession,
        }),
        WireMessage::TurnBegin(TurnBegin {
            user_input: UserInput::Parts(vec![ContentPart::text("hi")]),
        }),
        WireMessage::StatusUpdate(StatusUpdate {
            token_usage: Some(TokenUsage {
                input_other: 10,
                output: 5,
                ..Default::default()
            }),
            ..Default::default()
        }),
    ];
    for msg in &messages {
        assert_eq!(&round_trip(msg), msg);
    }
}

#[test]
fn approval_response_uses_snake_case() {
    assert_eq!(
        serde_json::to_value(ApprovalResponse::ApproveForSession).unwrap(),
        json!("approve_for_session")
    );
    assert_eq!(
        "reject".parse::<ApprovalResponse>().unwrap(),
        ApprovalResponse::Reject
    );
}
