use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use swallow_index::{Chunk, DocumentMetadata};

use super::server::AppState;

const SNIPPET_CHARS: usize = 100;

#[derive(serde::Deserialize)]
pub(crate) struct AskParams {
    pub q: Option<String>,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: &'static str,
}

#[derive(serde::Serialize)]
struct ChunkOverview<'a> {
    metadata: &'a DocumentMetadata,
    snippet: String,
}

#[derive(serde::Serialize)]
struct PingResponse {
    message: &'static str,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    chunks: usize,
}

pub(crate) async fn ask_handler(
    State(state): State<AppState>,
    Query(params): Query<AskParams>,
) -> impl IntoResponse {
    let Some(question) = params.q.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "query parameter `q` is required",
            }),
        )
            .into_response();
    };

    tracing::info!(question = %question, "answering question");
    Json(state.qa.ask(&question).await).into_response()
}

pub(crate) async fn chunks_handler(State(state): State<AppState>) -> impl IntoResponse {
    let overview: Vec<ChunkOverview<'_>> = state.qa.chunks().iter().map(overview).collect();
    Json(overview).into_response()
}

pub(crate) async fn ping_handler() -> impl IntoResponse {
    Json(PingResponse { message: "alive" })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        chunks: state.qa.chunks().len(),
    })
}

fn overview(chunk: &Chunk) -> ChunkOverview<'_> {
    ChunkOverview {
        metadata: &chunk.metadata,
        snippet: snippet(&chunk.content),
    }
}

/// First 100 characters, always followed by `...`.
fn snippet(content: &str) -> String {
    let mut snippet: String = content.chars().take(SNIPPET_CHARS).collect();
    snippet.push_str("...");
    snippet
}
