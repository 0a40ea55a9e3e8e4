//! Minimal Bot API stand-in for transport and handler tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        routing::post,
    },
    serde_json::{Value, json},
    teloxide::Bot,
};

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// API method as it appears in the path, e.g. `SendMessage`.
    pub method: String,
    pub body: String,
}

impl CapturedRequest {
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Ok,
    RateLimited,
    Failing,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    rate_limited_left: Arc<AtomicUsize>,
    mode: Mode,
}

pub struct MockBotApi {
    state: MockState,
    bot: Bot,
}

impl MockBotApi {
    pub async fn spawn() -> Self {
        Self::start(Mode::Ok, 0).await
    }

    /// Answer the first `times` calls with a 429 carrying `retry_after: 1`.
    pub async fn spawn_rate_limited(times: usize) -> Self {
        Self::start(Mode::RateLimited, times).await
    }

    /// Reject every call with "chat not found".
    pub async fn spawn_failing() -> Self {
        Self::start(Mode::Failing, 0).await
    }

    async fn start(mode: Mode, rate_limited: usize) -> Self {
        let state = MockState {
            requests: Arc::new(Mutex::new(Vec::new())),
            rate_limited_left: Arc::new(AtomicUsize::new(rate_limited)),
            mode,
        };
        let app = Router::new()
            .route("/{*path}", post(bot_api_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve mock bot api");
        });

        let api_url = url::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        let bot = Bot::new("test-token").set_api_url(api_url);
        Self { state, bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Bodies of every `SendMessage` call, parsed.
    pub fn sent_messages(&self) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "SendMessage")
            .filter_map(|r| r.json())
            .collect()
    }
}

fn message_result(chat_id: i64) -> Value {
    json!({
        "message_id": 1,
        "date": 0,
        "chat": { "id": chat_id, "type": "private" },
        "text": "ok"
    })
}

async fn bot_api_handler(
    State(state): State<MockState>,
    uri: Uri,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&body).to_string();
    let chat_id = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["chat_id"].as_i64())
        .unwrap_or(42);
    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.clone(),
        body,
    });

    match state.mode {
        Mode::RateLimited
            if state
                .rate_limited_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok() =>
        {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 1",
                    "parameters": { "retry_after": 1 }
                })),
            );
        },
        Mode::Failing => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: chat not found"
                })),
            );
        },
        Mode::Ok | Mode::RateLimited => {},
    }

    let result = match method.as_str() {
        "SendMessage" | "SendPhoto" => message_result(chat_id),
        "GetMe" => json!({
            "id": 1,
            "is_bot": true,
            "first_name": "vendorwatch",
            "username": "vendorwatch_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        }),
        "GetUpdates" => json!([]),
        _ => json!(true),
    };
    (StatusCode::OK, Json(json!({ "ok": true, "result": result })))
}
