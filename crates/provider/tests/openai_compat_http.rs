//! OpenAiCompatProvider against a local mock HTTP server

use confab_provider::{ChatParams, Message, OpenAiCompatProvider, Provider, ProviderError, ToolSpec};
use mockito::Matcher;
use serde_json::json;

#[tokio::test]
async fn test_chat_parses_final_reply() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer lm-studio")
        .match_body(Matcher::PartialJson(json!({ "model": "local" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "hi there" },
                    "finish_reason": "stop"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("lm-studio", Some(server.url()), Some("local".into()));
    let params = ChatParams::for_turn("", vec![Message::user("hello")], vec![]);
    let response = provider.chat(params).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.into_message(), Message::assistant("hi there"));
}

#[tokio::test]
async fn test_chat_parses_tool_calls() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({ "tool_choice": "auto" })))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_9",
                            "type": "function",
                            "function": { "name": "p1_search", "arguments": "{\"q\":\"x\"}" }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("k", Some(server.url()), None);
    let params = ChatParams::for_turn(
        "m",
        vec![Message::user("search x")],
        vec![ToolSpec::new("p1_search", "Search", json!({"type": "object"}))],
    );
    let response = provider.chat(params).await.unwrap();

    assert_eq!(response.invocations.len(), 1);
    assert_eq!(response.invocations[0].id, "call_9");
    assert_eq!(response.invocations[0].arguments, json!({"q": "x"}));
}

#[tokio::test]
async fn test_chat_maps_rate_limit() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("{}")
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("k", Some(server.url()), None);
    let result = provider.chat(ChatParams::default()).await;
    assert!(matches!(result, Err(ProviderError::RateLimited)));
}

#[tokio::test]
async fn test_chat_maps_api_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body(json!({ "error": { "message": "model not loaded" } }).to_string())
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("k", Some(server.url()), None);
    match provider.chat(ChatParams::default()).await {
        Err(ProviderError::Api(msg)) => assert!(msg.contains("model not loaded")),
        other => panic!("expected Api error, got {:?}", other.map(|r| r.content)),
    }
}

#[tokio::test]
async fn test_chat_maps_plain_text_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("upstream crashed")
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("k", Some(server.url()), None);
    match provider.chat(ChatParams::default()).await {
        Err(ProviderError::Api(msg)) => assert_eq!(msg, "500: upstream crashed"),
        other => panic!("expected Api error, got {:?}", other.map(|r| r.content)),
    }
}

#[tokio::test]
async fn test_chat_sends_tool_results_back() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""tool_call_id":"c1""#.into()),
            Matcher::Regex(r#""content":"contents of a""#.into()),
        ]))
        .with_status(200)
        .with_body(json!({ "choices": [{ "message": { "content": "a says hi" } }] }).to_string())
        .create_async()
        .await;

    let call = confab_provider::Invocation::new("c1", "fs_read_file", json!({ "path": "a" }));
    let provider = OpenAiCompatProvider::new("k", Some(server.url()), None);
    let params = ChatParams::for_turn(
        "m",
        vec![
            Message::user("read a"),
            Message::assistant_with_invocations("", vec![call.clone()]),
            Message::tool_result(&call, "contents of a"),
        ],
        vec![],
    );
    let response = provider.chat(params).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content.as_deref(), Some("a says hi"));
    assert_eq!(response.finish_reason, "stop");
}
