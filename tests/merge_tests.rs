//! Tests for the merge engine against scripted providers.

mod common;

use std::sync::{Arc, Mutex};

use common::provider_with_fragments;
use futures::FutureExt;
use pretty_assertions::assert_eq;
use turnwire::error::TurnwireError;
use turnwire::merge::{generate, merge_stream, FragmentCallback};
use turnwire::provider::ScriptedStream;
use turnwire::types::*;
use tokio_util::sync::CancellationToken;

async fn merge(fragments: Vec<Fragment>) -> Result<GenerationResult, TurnwireError> {
    let mut stream = ScriptedStream::from_fragments(fragments);
    merge_stream(&mut stream, None, None, &CancellationToken::new()).await
}

#[tokio::test]
async fn text_fragments_merge_into_one_unit() {
    let result = merge(vec![Fragment::text("Hel"), Fragment::text("lo")])
        .await
        .unwrap();
    assert_eq!(result.message.content, vec![ContentPart::text("Hello")]);
    assert_eq!(result.message.role, Role::Assistant);
}

#[tokio::test]
async fn unit_count_is_boundaries_plus_final_flush() {
    let fragments = vec![
        Fragment::think("a"),
        Fragment::think("b"),
        Fragment::text("c"),
        Fragment::text("d"),
        Fragment::think("e"),
        Fragment::Content(ContentPart::think_encrypted("f", "sig")),
        Fragment::think("g"),
        Fragment::text("h"),
    ];
    let boundaries = fragments
        .windows(2)
        .filter(|pair| !pair[0].clone().merge_in_place(&pair[1]))
        .count();
    let result = merge(fragments).await.unwrap();
    // think(ab) | text(cd) | think(ef, stamped) | think(g) | text(h)
    assert_eq!(boundaries + 1, 5);
    assert_eq!(result.message.content.len(), 5);
    assert_eq!(
        result.message.content[2],
        ContentPart::think_encrypted("ef", "sig")
    );
}

#[tokio::test]
async fn tool_arguments_concatenate_verbatim() {
    let result = merge(vec![
        Fragment::tool_call("c1", "add", r#"{"a":"#),
        Fragment::ToolCallPart(ToolCallPart::for_call("c1", "1}")),
    ])
    .await
    .unwrap();
    assert_eq!(
        result.message.tool_calls(),
        &[ToolCall::new("c1", "add").with_arguments(r#"{"a":1}"#)]
    );
}

#[tokio::test]
async fn empty_stream_is_an_empty_response() {
    let err = merge(Vec::new()).await.unwrap_err();
    assert!(matches!(err, TurnwireError::EmptyResponse));

    let err = merge(vec![Fragment::tool_call_part("{}")]).await.unwrap_err();
    assert!(matches!(err, TurnwireError::EmptyResponse));
}

#[tokio::test]
async fn generate_passes_history_and_reports_usage() {
    let provider = provider_with_fragments([Fragment::text("ok")]);
    let usage = TokenUsage {
        input_other: 12,
        output: 3,
        ..Default::default()
    };
    provider.push(ScriptedStream::from_fragments([Fragment::text("second")]).with_usage(usage));

    let history = vec![Message::user("hi"), Message::assistant("hello"), Message::user("again")];
    let cancel = CancellationToken::new();
    let first = generate(&provider, "sys", &[], &history, None, None, &cancel)
        .await
        .unwrap();
    assert_eq!(first.usage, None);
    let second = generate(&provider, "sys", &[], &history[..1], None, None, &cancel)
        .await
        .unwrap();
    assert_eq!(second.usage, Some(usage));
    assert_eq!(provider.history_lengths(), vec![3, 1]);
}

#[tokio::test]
async fn observer_sees_raw_fragments_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: FragmentCallback = Arc::new(move |fragment: Fragment| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(fragment);
        }
        .boxed()
    });
    let fragments = vec![
        Fragment::text("a"),
        Fragment::text("b"),
        Fragment::tool_call("c1", "ls", ""),
    ];
    let mut stream = ScriptedStream::from_fragments(fragments.clone());
    merge_stream(&mut stream, Some(&callback), None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), fragments);
}
