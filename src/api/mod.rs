use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::error::{IngestionError, RagError};
use crate::knowledge_base::KnowledgeBase;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 16;

#[derive(Clone)]
pub struct AppState {
    kb: Arc<KnowledgeBase>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    question: String,
    #[validate(range(min = 1, max = 50))]
    k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: String,
    document: String,
    index_built: bool,
}

#[derive(Debug, Serialize)]
struct RebuildResponse {
    status: String,
    entries: usize,
}

type ApiError = (StatusCode, Json<ApiResponse>);

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(ApiResponse { status: format!("error: {}", message) }))
}

fn rag_error(e: RagError) -> ApiError {
    let status = match &e {
        RagError::IndexUnavailable => StatusCode::CONFLICT,
        RagError::Ingestion { source: IngestionError::Unsupported(_), .. } => StatusCode::BAD_REQUEST,
        RagError::Ingestion { source: IngestionError::Extract(_), .. } => StatusCode::BAD_REQUEST,
        RagError::Ingestion { source: IngestionError::Embedding(_), .. }
        | RagError::Retrieval(_)
        | RagError::Generation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log::error!("Request failed: {}", e);
    error_response(status, e)
}

/// Create and configure the API router
pub fn create_api(kb: Arc<KnowledgeBase>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/documents/:name", put(upload_handler))
        .route("/api/index/rebuild", post(rebuild_handler))
        .route("/api/index", delete(clear_handler))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(cors)
        .with_state(AppState { kb })
}

async fn status_handler(State(state): State<AppState>) -> Response {
    match state.kb.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => rag_error(e).into_response(),
    }
}

async fn ask_handler(
    State(state): State<AppState>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()).into_response(),
    };
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, e).into_response();
    }
    let question = request.question.trim();
    if question.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "question must not be blank").into_response();
    }

    log::info!("Question: {}", question);
    match state.kb.ask(question, request.k).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => rag_error(e).into_response(),
    }
}

async fn upload_handler(State(state): State<AppState>, Path(name): Path<String>, body: Bytes) -> Response {
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty upload").into_response();
    }

    let stored = match state.kb.add_document(&name, &body).await {
        Ok(path) => path,
        Err(e) => return rag_error(e).into_response(),
    };

    let index_built = match state.kb.build_if_missing().await {
        Ok(built) => built,
        Err(e) => return rag_error(e).into_response(),
    };

    Json(UploadResponse {
        status: "ok".to_string(),
        document: stored
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name),
        index_built,
    })
    .into_response()
}

async fn rebuild_handler(State(state): State<AppState>) -> Response {
    match state.kb.rebuild().await {
        Ok(index) => Json(RebuildResponse {
            status: "ok".to_string(),
            entries: index.len(),
        })
        .into_response(),
        Err(e) => rag_error(e).into_response(),
    }
}

async fn clear_handler(State(state): State<AppState>) -> Response {
    match state.kb.clear().await {
        Ok(()) => Json(ApiResponse { status: "ok".to_string() }).into_response(),
        Err(e) => rag_error(e).into_response(),
    }
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "no such route").into_response()
}
