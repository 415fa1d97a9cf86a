#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use chatstream_rs::config::{ApiConfig, HttpConfig};
use chatstream_rs::{
    AccumulatedMessage, CallParams, ChatClient, MemoryHistoryStore, Message, StreamOptions,
    StreamingCall, UpdateCallback,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub const CONVERSATION_ID: &str = "conv-1";

/// What the mock upstream saw.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

pub type Capture = Arc<Mutex<Option<CapturedRequest>>>;

/// One piece of a scripted SSE body: bytes to send after an optional pause.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub delay: Duration,
    pub bytes: Vec<u8>,
}

impl Chunk {
    pub fn now(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            delay: Duration::ZERO,
            bytes: bytes.into(),
        }
    }

    pub fn after(delay: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            delay,
            bytes: bytes.into(),
        }
    }
}

pub fn sse_response(chunks: Vec<Chunk>) -> Response {
    let stream = futures_util::stream::unfold(chunks.into_iter(), |mut chunks| async move {
        let chunk = chunks.next()?;
        if !chunk.delay.is_zero() {
            tokio::time::sleep(chunk.delay).await;
        }
        Some((Ok::<_, std::io::Error>(Bytes::from(chunk.bytes)), chunks))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(stream))
        .expect("sse response")
}

pub fn openai_content(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices":[{"index":0,"delta":{"content":content},"finish_reason":null}]})
    )
}

pub fn openai_reasoning(reasoning: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices":[{"index":0,"delta":{"reasoning_content":reasoning}}]})
    )
}

/// Serve `chunks` as an SSE body on `route`, recording the request.
pub fn scripted_upstream(route: &str, chunks: Vec<Chunk>, capture: Capture) -> Router {
    Router::new().route(
        route,
        post(move |uri: Uri, headers: HeaderMap, body: Bytes| {
            let chunks = chunks.clone();
            let capture = Arc::clone(&capture);
            async move {
                *capture.lock() = Some(CapturedRequest {
                    path: uri.path().to_string(),
                    query: uri.query().map(str::to_string),
                    headers,
                    body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
                });
                sse_response(chunks)
            }
        }),
    )
}

pub async fn spawn_upstream(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, server)
}

/// Records every snapshot handed to the UI callback.
#[derive(Clone, Default)]
pub struct FlushRecorder {
    pub flushes: Arc<Mutex<Vec<(std::time::Instant, AccumulatedMessage)>>>,
}

impl FlushRecorder {
    pub fn callback(&self) -> UpdateCallback {
        let flushes = Arc::clone(&self.flushes);
        Arc::new(move |conversation_id: &str, snapshot: AccumulatedMessage| {
            assert_eq!(conversation_id, CONVERSATION_ID);
            flushes.lock().push((std::time::Instant::now(), snapshot));
        })
    }

    pub fn count(&self) -> usize {
        self.flushes.lock().len()
    }

    pub fn snapshots(&self) -> Vec<AccumulatedMessage> {
        self.flushes.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn times(&self) -> Vec<std::time::Instant> {
        self.flushes.lock().iter().map(|(t, _)| *t).collect()
    }
}

pub struct Harness {
    pub store: Arc<MemoryHistoryStore>,
    pub recorder: FlushRecorder,
    pub call: StreamingCall,
}

pub fn prepare_call(
    api: ApiConfig,
    messages: Vec<Message>,
    options: StreamOptions,
    update_interval: Duration,
) -> Harness {
    prepare_call_with_params(CallParams::new(messages, api), options, update_interval)
}

pub fn prepare_call_with_params(
    params: CallParams,
    options: StreamOptions,
    update_interval: Duration,
) -> Harness {
    let client = ChatClient::new(&HttpConfig::default())
        .expect("client")
        .with_update_interval(update_interval);
    let store = Arc::new(MemoryHistoryStore::new());
    let recorder = FlushRecorder::default();
    let call = client.call_api(
        params,
        store.clone(),
        CONVERSATION_ID,
        recorder.callback(),
        options,
    );
    Harness {
        store,
        recorder,
        call,
    }
}
