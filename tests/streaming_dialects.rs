mod common;

use std::sync::Arc;
use std::time::Duration;

use chatstream_rs::config::ApiConfig;
use chatstream_rs::{Message, StreamOptions};
use common::{prepare_call, scripted_upstream, spawn_upstream, Capture, Chunk};
use serde_json::json;

const INTERVAL: Duration = Duration::from_millis(100);

fn gemini_record(text: &str) -> String {
    format!(
        "data: {}\r\n\r\n",
        json!({"candidates":[{"content":{"role":"model","parts":[{"text":text}]},"index":0}]})
    )
}

#[tokio::test]
async fn test_gemini_resolved_from_url_and_streamed() {
    let capture = Capture::default();
    let app = scripted_upstream(
        "/gemini/v1beta/models/{action}",
        vec![
            Chunk::now(gemini_record("Bonjour")),
            Chunk::now(gemini_record(" le monde")),
            Chunk::now(format!(
                "data: {}\r\n\r\n",
                json!({
                    "candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}],
                    "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":3}
                })
            )),
        ],
        Arc::clone(&capture),
    );
    let (addr, server) = spawn_upstream(app).await;

    let harness = prepare_call(
        ApiConfig::new(format!("http://{addr}/gemini"), "g-key"),
        vec![
            Message::system("Be terse"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("again"),
        ],
        StreamOptions::default(),
        INTERVAL,
    );
    let result = harness
        .call
        .start_streaming()
        .await
        .expect("stream succeeds")
        .expect("not cancelled");
    assert_eq!(result.content, "Bonjour le monde!");
    assert_eq!(result.reasoning_content, "");

    let captured = capture.lock().clone().expect("request captured");
    assert_eq!(
        captured.path,
        "/gemini/v1beta/models/gemini-1.5-flash:streamGenerateContent"
    );
    assert_eq!(captured.query.as_deref(), Some("key=g-key&alt=sse"));
    assert!(captured.headers.get("authorization").is_none());
    assert_eq!(
        captured.body,
        json!({
            "contents": [
                {"role":"user","parts":[{"text":"hi"}]},
                {"role":"model","parts":[{"text":"hello"}]},
                {"role":"user","parts":[{"text":"again"}]}
            ],
            "systemInstruction": {"parts":[{"text":"Be terse"}]},
            "generationConfig": {"temperature":1.0,"maxOutputTokens":8192}
        })
    );
    server.abort();
}

#[tokio::test]
async fn test_claude_explicit_format() {
    let capture = Capture::default();
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"usage\":{\"input_tokens\":9,\"output_tokens\":1}}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Short\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" answer.\"}}\n\n",
        "event: content_block_stop\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":4}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    let app = scripted_upstream("/v1/messages", vec![Chunk::now(body)], Arc::clone(&capture));
    let (addr, server) = spawn_upstream(app).await;

    let mut api = ApiConfig::new(format!("http://{addr}"), "ak-test");
    api.api_format = Some("claude".to_string());
    let harness = prepare_call(
        api,
        vec![Message::system("Be terse"), Message::user("Explain SSE")],
        StreamOptions::default(),
        INTERVAL,
    );
    let result = harness
        .call
        .start_streaming()
        .await
        .expect("stream succeeds")
        .expect("not cancelled");
    assert_eq!(result.content, "Short answer.");

    let captured = capture.lock().clone().expect("request captured");
    assert_eq!(captured.path, "/v1/messages");
    assert_eq!(captured.headers.get("x-api-key").expect("key header"), "ak-test");
    assert_eq!(
        captured.headers.get("anthropic-version").expect("version header"),
        "2023-06-01"
    );
    assert_eq!(
        captured
            .headers
            .get("anthropic-dangerous-direct-browser-access")
            .expect("browser access header"),
        "true"
    );
    assert!(captured.headers.get("authorization").is_none());
    assert_eq!(
        captured.body,
        json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 8192,
            "system": "Be terse",
            "messages": [
                {"role":"user","content":[{"type":"text","text":"Explain SSE"}]}
            ],
            "stream": true
        })
    );
    server.abort();
}

#[tokio::test]
async fn test_claude_thinking_deltas_feed_reasoning() {
    let body = concat!(
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"Considering.\"}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"text_delta\",\"text\":\"Done.\"}}\n\n",
    );
    let app = scripted_upstream("/claude/v1/messages", vec![Chunk::now(body)], Capture::default());
    let (addr, server) = spawn_upstream(app).await;

    // No explicit format: the "claude" path marker selects the dialect.
    let harness = prepare_call(
        ApiConfig::new(format!("http://{addr}/claude/v1"), "ak"),
        vec![Message::user("hi")],
        StreamOptions::default(),
        INTERVAL,
    );
    let result = harness
        .call
        .start_streaming()
        .await
        .expect("stream succeeds")
        .expect("not cancelled");
    assert_eq!(result.content, "Done.");
    assert_eq!(result.reasoning_content, "Considering.");
    server.abort();
}

#[tokio::test]
async fn test_guard_does_not_apply_to_claude() {
    let body = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"<think>literal\"}}\n\n";
    let app = scripted_upstream("/v1/messages", vec![Chunk::now(body)], Capture::default());
    let (addr, server) = spawn_upstream(app).await;

    let mut api = ApiConfig::new(format!("http://{addr}"), "ak");
    api.api_format = Some("claude".to_string());
    let options = StreamOptions {
        detect_misfiled_think_silently: true,
        ..StreamOptions::default()
    };
    let harness = prepare_call(api, vec![Message::user("hi")], options, INTERVAL);
    let result = harness
        .call
        .start_streaming()
        .await
        .expect("guard is openai-only")
        .expect("not cancelled");
    assert_eq!(result.content, "<think>literal");
    server.abort();
}
