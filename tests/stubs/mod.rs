#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

fn json_header() -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header")
}

fn html_header() -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        .expect("build header")
}

struct StubThread {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StubThread {
    fn spawn<F>(server: tiny_http::Server, mut handle_request: F) -> Self
    where
        F: FnMut(tiny_http::Request) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(request)) => handle_request(request),
                    Ok(None) => continue,
                    Err(_) => break,
                }
            }
        });
        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for StubThread {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Serves a fixed set of HTML pages; anything else is a 404 page.
pub struct SiteStub {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    _thread: StubThread,
}

impl SiteStub {
    pub fn spawn(pages: &[(&str, u16, &str)]) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let base_url = format!("http://{}", server.server_addr());

        let pages: HashMap<String, (u16, String)> = pages
            .iter()
            .map(|(path, status, html)| ((*path).to_owned(), (*status, (*html).to_owned())))
            .collect();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let hits_in_thread = Arc::clone(&hits);

        let thread = StubThread::spawn(server, move |request| {
            let url = request.url().to_owned();
            hits_in_thread.lock().unwrap().push(url.clone());
            let (status, body) = pages
                .get(&url)
                .cloned()
                .unwrap_or_else(|| (404, "<html><body><h1>Not found</h1></body></html>".to_owned()));
            let _ = request.respond(
                tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(html_header()),
            );
        });

        Self {
            base_url,
            hits,
            _thread: thread,
        }
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

/// What the LLM stub answers with, for either backend.
#[derive(Debug, Clone)]
pub enum LlmBehavior {
    /// A schema-conforming summary whose overview is the given text.
    Summary(String),
    /// The same summary wrapped in a ```json fence.
    FencedSummary(String),
    /// Gemini: `candidates: []`; Grok: `choices: []`.
    Empty,
    /// Text that is not JSON.
    Garbage,
    /// HTTP 500 with an `error.message`.
    ServerError,
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Answers Gemini `generateContent` under `/v1beta` and Grok
/// `chat/completions` under `/v1`.
pub struct LlmStub {
    pub gemini_base_url: String,
    pub grok_base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    _thread: StubThread,
}

fn summary_text(overview: &str) -> String {
    serde_json::json!({
        "overview": overview,
        "sections": ["Home: landing page"],
        "highlights": ["Fast shipping"],
        "recommendations": ["Add pricing page"],
    })
    .to_string()
}

fn model_text(behavior: &LlmBehavior) -> Option<String> {
    match behavior {
        LlmBehavior::Summary(overview) => Some(summary_text(overview)),
        LlmBehavior::FencedSummary(overview) => {
            Some(format!("```json\n{}\n```", summary_text(overview)))
        }
        LlmBehavior::Garbage => Some("I cannot produce JSON today.".to_owned()),
        LlmBehavior::Empty | LlmBehavior::ServerError => None,
    }
}

fn gemini_body(behavior: &LlmBehavior) -> Value {
    match model_text(behavior) {
        Some(text) => serde_json::json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": text }] }, "finishReason": "STOP" }
            ]
        }),
        None => serde_json::json!({ "candidates": [] }),
    }
}

fn grok_body(behavior: &LlmBehavior) -> Value {
    match model_text(behavior) {
        Some(text) => serde_json::json!({
            "id": "chatcmpl-stub",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": text }, "finish_reason": "stop" }
            ]
        }),
        None => serde_json::json!({ "choices": [] }),
    }
}

impl LlmStub {
    pub fn spawn(behavior: LlmBehavior) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start llm stub server");
        let addr = server.server_addr();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_in_thread = Arc::clone(&requests);

        let thread = StubThread::spawn(server, move |mut request| {
            let url = request.url().to_owned();
            let path = url.split('?').next().unwrap_or(&url).to_owned();
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_owned());

            let mut raw = String::new();
            let _ = request.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            requests_in_thread.lock().unwrap().push(CapturedRequest {
                path: url.clone(),
                authorization,
                body,
            });

            let is_gemini = path.starts_with("/v1beta/models/") && path.ends_with(":generateContent");
            let is_grok = path == "/v1/chat/completions";
            if request.method() != &tiny_http::Method::Post || !(is_gemini || is_grok) {
                let _ = request.respond(
                    tiny_http::Response::from_string("not found").with_status_code(404),
                );
                return;
            }

            if matches!(behavior, LlmBehavior::ServerError) {
                let body = serde_json::json!({ "error": { "code": 500, "message": "stub exploded" } });
                let _ = request.respond(
                    tiny_http::Response::from_string(body.to_string())
                        .with_status_code(500)
                        .with_header(json_header()),
                );
                return;
            }

            let body = if is_gemini {
                gemini_body(&behavior)
            } else {
                grok_body(&behavior)
            };
            let _ = request.respond(
                tiny_http::Response::from_string(body.to_string())
                    .with_status_code(200)
                    .with_header(json_header()),
            );
        });

        Self {
            gemini_base_url: format!("http://{addr}/v1beta"),
            grok_base_url: format!("http://{addr}/v1"),
            requests,
            _thread: thread,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
