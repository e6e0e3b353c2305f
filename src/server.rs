//! Agent-facing HTTP tool server.
//!
//! Exposes the retrieval manager as a small JSON tool API for agent
//! integration.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/tools/search_documents` | Semantic search |
//! | `POST` | `/tools/store_document` | Store a document |
//! | `POST` | `/tools/get_document_info` | Fetch a document by id |
//! | `GET`  | `/tools/list` | List the tools with parameter schemas |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error`
//! (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::Error;
use crate::manager::{
    RetrievalManager, DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_THRESHOLD,
};

#[derive(Clone)]
struct AppState {
    manager: Arc<RetrievalManager>,
}

/// Start the tool server on `bind_addr` and serve until the process exits.
pub async fn run_server(manager: Arc<RetrievalManager>, bind_addr: &str) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/tools/search_documents", post(handle_search))
        .route("/tools/store_document", post(handle_store))
        .route("/tools/get_document_info", post(handle_get))
        .route("/tools/list", get(handle_list_tools))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { manager });

    info!(addr = bind_addr, "tool server listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g. `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Map core errors onto the HTTP contract. The core never assumes HTTP; the
/// translation lives entirely here.
impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::NotFound(_) => not_found(message),
            Error::Config(_) | Error::Parse(_) => bad_request(message),
            Error::Embedding(_) | Error::Store(_) | Error::Fetch(_) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error".to_string(),
                message,
            },
            Error::DuplicateDocument(_) | Error::Io(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message,
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools() -> Json<ToolListResponse> {
    let tools = vec![
        ToolInfo {
            name: "search_documents".to_string(),
            description: "Semantic search over stored documents".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "default": DEFAULT_SEARCH_LIMIT },
                    "threshold": { "type": "number", "default": DEFAULT_SEARCH_THRESHOLD },
                    "source_type": { "type": "string" }
                },
                "required": ["query"]
            }),
        },
        ToolInfo {
            name: "store_document".to_string(),
            description: "Store a document for later retrieval".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "metadata": { "type": "object" },
                    "source_type": { "type": "string" },
                    "source_url": { "type": "string" }
                },
                "required": ["content"]
            }),
        },
        ToolInfo {
            name: "get_document_info".to_string(),
            description: "Fetch a stored document by id".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" }
                },
                "required": ["id"]
            }),
        },
    ];
    Json(ToolListResponse { tools })
}

// ============ POST /tools/search_documents ============

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    limit: Option<usize>,
    threshold: Option<f32>,
    source_type: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(params): Json<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let hits = state
        .manager
        .search(
            &params.query,
            params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            params.threshold.unwrap_or(DEFAULT_SEARCH_THRESHOLD),
            params.source_type.as_deref(),
        )
        .await?;
    Ok(Json(serde_json::json!({ "result": hits })))
}

// ============ POST /tools/store_document ============

#[derive(Deserialize)]
struct StoreParams {
    content: String,
    metadata: Option<serde_json::Value>,
    source_type: Option<String>,
    source_url: Option<String>,
}

async fn handle_store(
    State(state): State<AppState>,
    Json(params): Json<StoreParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.content.trim().is_empty() {
        return Err(bad_request("content must not be empty"));
    }

    let id = state
        .manager
        .store(crate::manager::StoreRequest {
            content: params.content,
            metadata: params.metadata,
            source_type: params.source_type,
            source_url: params.source_url,
            chunk_index: 0,
        })
        .await?;
    Ok(Json(serde_json::json!({ "result": { "id": id } })))
}

// ============ POST /tools/get_document_info ============

#[derive(Deserialize)]
struct GetParams {
    id: String,
}

async fn handle_get(
    State(state): State<AppState>,
    Json(params): Json<GetParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let doc = state
        .manager
        .get(&params.id)
        .await?
        .ok_or_else(|| not_found(format!("no document with id: {}", params.id)))?;
    Ok(Json(serde_json::json!({ "result": doc })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_contract_codes() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (Error::Parse("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (Error::Store("x".into()), StatusCode::BAD_GATEWAY, "upstream_error"),
            (Error::Embedding("x".into()), StatusCode::BAD_GATEWAY, "upstream_error"),
            (Error::Fetch("x".into()), StatusCode::BAD_GATEWAY, "upstream_error"),
        ];
        for (err, status, code) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status, status);
            assert_eq!(app_err.code, code);
        }
    }
}
