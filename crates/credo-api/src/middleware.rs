//! Request-id correlation, body-size limiting, and a fixed-window rate
//! limiter over mutating endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

const ERROR_BODY_CAP: usize = 64 * 1024;

/// Accept `X-Request-ID` or mint a short one; echo it on every response and
/// merge it into JSON error envelopes.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let rid = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..12].to_string());

    req.extensions_mut().insert(RequestId(rid.clone()));
    let mut response = next.run(req).await;

    if response.status().is_client_error() || response.status().is_server_error() {
        response = merge_request_id(response, &rid).await;
    }

    if let Ok(value) = HeaderValue::from_str(&rid) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

async fn merge_request_id(response: Response, rid: &str) -> Response {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, ERROR_BODY_CAP).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let rebuilt = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut map)) => {
            map.insert("request_id".to_string(), Value::String(rid.to_string()));
            serde_json::to_vec(&Value::Object(map)).unwrap_or_else(|_| bytes.to_vec())
        }
        _ => bytes.to_vec(),
    };

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(rebuilt))
}

/// Per-route latency and a global request counter.
pub async fn record_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let label = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| format!("{} {}", req.method(), p.as_str()))
        .unwrap_or_else(|| format!("{} {}", req.method(), req.uri().path()));

    let start = Instant::now();
    let response = next.run(req).await;

    state.metrics.inc("http.requests");
    state
        .metrics
        .observe_ms(&label, start.elapsed().as_secs_f64() * 1000.0);
    response
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Deterministic 413 with an empty body when Content-Length already says
/// the payload is over the limit. The router's body limit catches the
/// streaming case.
pub async fn body_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    let enforce = is_mutating(req.method())
        && (path.starts_with("/v1/") || path.starts_with("/agents/"));

    if enforce {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(len) = declared {
            if len > state.settings.max_body_bytes as u64 {
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
        }
    }

    next.run(req).await
}

/// Fixed-window per-client hit counting.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        if entry.len() >= self.max_requests as usize {
            return false;
        }
        entry.push(now);
        true
    }
}

/// 429 on mutating `/v1/` requests past the per-IP budget. Off unless
/// enabled in settings.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.settings.rate_limit_enabled
        && is_mutating(req.method())
        && req.uri().path().starts_with("/v1/")
    {
        let key = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if !state.rate_limiter.check(&key) {
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    }

    next.run(req).await
}
