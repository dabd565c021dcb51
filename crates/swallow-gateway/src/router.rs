use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use super::handlers::{ask_handler, chunks_handler, health_handler, ping_handler};
use super::server::AppState;

#[derive(Clone)]
struct AuthConfig {
    token: Option<String>,
}

const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct RateLimitState {
    limit: u32,
    counters: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

/// Routes with bearer auth and per-IP rate limiting applied to `/ask` only.
pub fn build_router(state: AppState, auth_token: Option<String>, rate_limit: u32) -> Router {
    let auth_cfg = AuthConfig { token: auth_token };
    let rate_state = RateLimitState {
        limit: rate_limit,
        counters: Arc::new(Mutex::new(HashMap::new())),
    };

    let protected = Router::new()
        .route("/ask", get(ask_handler))
        .layer(middleware::from_fn_with_state(
            rate_state,
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(auth_cfg, auth_middleware));

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/chunks", get(chunks_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn auth_middleware(
    axum::extract::State(cfg): axum::extract::State<AuthConfig>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(ref expected) = cfg.token {
        let token = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");

        // Compare fixed-length digests so the token length is not observable.
        let token_hash = blake3::hash(token.as_bytes());
        let expected_hash = blake3::hash(expected.as_bytes());
        if !bool::from(token_hash.as_bytes().ct_eq(expected_hash.as_bytes())) {
            tracing::debug!("rejected request with missing or invalid bearer token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    next.run(req).await
}

async fn rate_limit_middleware(
    axum::extract::State(state): axum::extract::State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.limit == 0 {
        return next.run(req).await;
    }

    let ip = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    let now = Instant::now();
    let mut counters = state.counters.lock().await;

    if counters.len() >= MAX_RATE_LIMIT_ENTRIES && !counters.contains_key(&ip) {
        counters.retain(|_, (_, ts)| now.duration_since(*ts) < RATE_WINDOW);
    }

    let entry = counters.entry(ip).or_insert((0, now));
    if now.duration_since(entry.1) >= RATE_WINDOW {
        *entry = (1, now);
    } else {
        entry.0 += 1;
        if entry.0 > state.limit {
            tracing::debug!(%ip, "rate limit exceeded");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    }
    drop(counters);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex as StdMutex;

    use axum::body::Body;
    use http_body_util::BodyExt;
    use swallow_core::{Answer, AskResponse, QuestionAnswerer};
    use swallow_index::{Chunk, DocumentMetadata};
    use tower::ServiceExt;

    use super::*;

    /// Echoes the question back and records what it was asked.
    struct StubAnswerer {
        chunks: Vec<Chunk>,
        asked: StdMutex<Vec<String>>,
        fail: bool,
    }

    impl StubAnswerer {
        fn new(fail: bool) -> Self {
            let chunks = vec![
                Chunk {
                    content: format!("Class: Foo\nFile: Foo.java\n{}", "x".repeat(200)),
                    metadata: DocumentMetadata {
                        class: "Foo".into(),
                        file_path: "Foo.java".into(),
                    },
                    index: 0,
                },
                Chunk {
                    content: "Class: Bar".into(),
                    metadata: DocumentMetadata {
                        class: "Bar".into(),
                        file_path: "Bar.java".into(),
                    },
                    index: 0,
                },
            ];
            Self {
                chunks,
                asked: StdMutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl QuestionAnswerer for StubAnswerer {
        fn ask<'a>(
            &'a self,
            question: &'a str,
        ) -> Pin<Box<dyn Future<Output = AskResponse> + Send + 'a>> {
            self.asked.lock().unwrap().push(question.to_owned());
            Box::pin(async move {
                if self.fail {
                    return AskResponse::error(question, "LLM call timed out after 120s");
                }
                AskResponse::Answer(Answer {
                    question: question.to_owned(),
                    answer: format!("answer to {question}"),
                    sources: vec![self.chunks[0].metadata.clone()],
                })
            })
        }

        fn chunks(&self) -> &[Chunk] {
            &self.chunks
        }
    }

    fn make_router(auth: Option<String>, rate_limit: u32) -> (Router, Arc<StubAnswerer>) {
        let stub = Arc::new(StubAnswerer::new(false));
        let state = AppState::new(stub.clone());
        (build_router(state, auth, rate_limit), stub)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn ping_is_alive() {
        let (app, _) = make_router(None, 0);
        let resp = app.oneshot(get_req("/ping")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(json_body(resp).await, serde_json::json!({"message": "alive"}));
    }

    #[tokio::test]
    async fn health_reports_chunk_count() {
        let (app, _) = make_router(None, 0);
        let resp = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["chunks"], 2);
    }

    #[tokio::test]
    async fn chunks_lists_metadata_and_snippets() {
        let (app, _) = make_router(None, 0);
        let resp = app.oneshot(get_req("/chunks")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0]["metadata"],
            serde_json::json!({"class": "Foo", "file_path": "Foo.java"})
        );
        let snippet = items[0]["snippet"].as_str().unwrap();
        assert_eq!(snippet.chars().count(), 103);
        assert!(snippet.starts_with("Class: Foo\nFile: Foo.java\n"));
        assert_eq!(items[1]["snippet"], "Class: Bar...");
    }

    #[tokio::test]
    async fn ask_returns_answer_with_sources() {
        let (app, stub) = make_router(None, 0);
        let resp = app
            .oneshot(get_req("/ask?q=What%20does%20Foo%20do%3F"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["question"], "What does Foo do?");
        assert_eq!(json["answer"], "answer to What does Foo do?");
        assert_eq!(
            json["sources"],
            serde_json::json!([{"class": "Foo", "file_path": "Foo.java"}])
        );
        assert_eq!(*stub.asked.lock().unwrap(), vec!["What does Foo do?".to_owned()]);
    }

    #[tokio::test]
    async fn ask_failure_is_still_success_status() {
        let stub = Arc::new(StubAnswerer::new(true));
        let app = build_router(AppState::new(stub), None, 0);
        let resp = app.oneshot(get_req("/ask?q=hello")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["question"], "hello");
        assert_eq!(json["error"], "LLM call timed out after 120s");
        assert!(json.get("answer").is_none());
    }

    #[tokio::test]
    async fn ask_without_question_is_bad_request() {
        let (app, stub) = make_router(None, 0);
        let resp = app.clone().oneshot(get_req("/ask")).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert!(json_body(resp).await["error"].is_string());

        let resp = app.oneshot(get_req("/ask?q=%20%20")).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert!(stub.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auth_rejects_missing_token() {
        let (app, _) = make_router(Some("secret".into()), 0);
        let resp = app.oneshot(get_req("/ask?q=hi")).await.unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn auth_rejects_wrong_token() {
        let (app, _) = make_router(Some("secret".into()), 0);
        let req = Request::builder()
            .uri("/ask?q=hi")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn auth_accepts_valid_token() {
        let (app, _) = make_router(Some("secret".into()), 0);
        let req = Request::builder()
            .uri("/ask?q=hi")
            .header("authorization", "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn open_endpoints_skip_auth() {
        let (app, _) = make_router(Some("secret".into()), 0);
        for uri in ["/ping", "/health", "/chunks"] {
            let resp = app.clone().oneshot(get_req(uri)).await.unwrap();
            assert_eq!(resp.status(), 200, "{uri}");
        }
    }

    #[tokio::test]
    async fn rate_limit_enforced() {
        use tower::Service;

        let (mut app, _) = make_router(None, 2);

        let resp = app.call(get_req("/ask?q=a")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = app.call(get_req("/ask?q=b")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = app.call(get_req("/ask?q=c")).await.unwrap();
        assert_eq!(resp.status(), 429);

        let resp = app.call(get_req("/ping")).await.unwrap();
        assert_eq!(resp.status(), 200);
    }
}
