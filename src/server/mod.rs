//! HTTP daemon mode.
//!
//! Exposes a small HTTP+JSON API over one shared engine:
//!
//! - `GET  /v1/health` – health check.
//! - `POST /v1/index` – index a list of paths and resolve.
//! - `POST /v1/resolve` – run resolution.
//! - `POST /v1/symbols` – symbol listing with filters.
//! - `POST /v1/search` – symbol search by name pattern.
//! - `POST /v1/summary` – project summary.
//!
//! The server is intentionally thin: it deserializes requests,
//! delegates to the engine, and maps [`EngineError`] kinds onto HTTP
//! status codes with a stable `{error, kind}` envelope.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::engine::{Engine, EngineError, ErrorKind, IndexReport, ResolveReport};
use crate::models::{Page, Paged};
use crate::query::{parse_kinds, parse_sort, parse_visibility, ProjectSummary};
use crate::store::{SymbolFilter, SymbolInfo};

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: &'static str,
    /// Schema version of the JSON query payloads.
    version: &'static str,
}

/// JSON error envelope with a stable kind tag.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Storage | ErrorKind::Script => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                kind,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Request payload for `/v1/index`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexRequest {
    pub paths: Vec<PathBuf>,
    /// Resolve after indexing (default true).
    #[serde(default = "default_true")]
    pub resolve: bool,
}

fn default_true() -> bool {
    true
}

/// Shared request payload for `/v1/symbols` and `/v1/search`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SymbolsRequest {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub ref_min: Option<u64>,
    #[serde(default)]
    pub ref_max: Option<u64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryRequest {
    #[serde(default = "default_top")]
    pub top: u32,
}

fn default_top() -> u32 {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexResponse {
    pub index: IndexReport,
    pub resolve: Option<ResolveReport>,
}

/// Build the router over a shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/index", post(index))
        .route("/v1/resolve", post(resolve))
        .route("/v1/symbols", post(symbols))
        .route("/v1/search", post(search))
        .route("/v1/summary", post(summary))
        .with_state(engine)
}

/// Run the server bound to `addr`; used by `canopy serve`.
pub async fn run(addr: SocketAddr, engine: Arc<Engine>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "canopy server listening");
    serve_with_listener(listener, engine).await
}

/// Run the server on an existing listener; used by tests to bind an
/// ephemeral port.
pub async fn serve_with_listener(listener: TcpListener, engine: Arc<Engine>) -> Result<()> {
    let app = router(engine);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::models::QUERY_RESULT_VERSION,
    })
}

async fn index(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    let report = tokio::task::block_in_place(|| -> Result<IndexResponse, EngineError> {
        let mut index_report = IndexReport::default();
        for path in &request.paths {
            let report = if path.is_dir() {
                engine.index_directory(path)?
            } else {
                engine.index_files(std::slice::from_ref(path))?
            };
            index_report.files_seen += report.files_seen;
            index_report.files_indexed += report.files_indexed;
            index_report.files_unchanged += report.files_unchanged;
            index_report.files_removed += report.files_removed;
            index_report.symbols_indexed += report.symbols_indexed;
        }
        let resolve_report = if request.resolve {
            Some(engine.resolve()?)
        } else {
            None
        };
        Ok(IndexResponse {
            index: index_report,
            resolve: resolve_report,
        })
    })
    .map_err(ApiError::from)?;
    Ok(Json(report))
}

async fn resolve(
    State(engine): State<Arc<Engine>>,
) -> Result<Json<ResolveReport>, ApiError> {
    let report =
        tokio::task::block_in_place(|| engine.resolve()).map_err(ApiError::from)?;
    Ok(Json(report))
}

fn filter_from(request: &SymbolsRequest) -> Result<SymbolFilter, EngineError> {
    let visibility = match &request.visibility {
        Some(value) => Some(parse_visibility(value)?),
        None => None,
    };
    Ok(SymbolFilter {
        kinds: parse_kinds(&request.kinds)?,
        exclude_kinds: Vec::new(),
        visibility,
        modifiers: request.modifiers.clone(),
        file_id: None,
        parent_id: None,
        path_prefix: request.path_prefix.clone(),
        ref_count_min: request.ref_min,
        ref_count_max: request.ref_max,
        name_glob: None,
    })
}

async fn symbols(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SymbolsRequest>,
) -> Result<Json<Paged<SymbolInfo>>, ApiError> {
    let page = tokio::task::block_in_place(|| -> Result<_, EngineError> {
        let filter = filter_from(&request)?;
        let sort = parse_sort(request.sort.as_deref(), request.order.as_deref())?;
        engine.query().symbols(
            &filter,
            sort,
            Page {
                offset: request.offset,
                limit: request.limit,
            },
        )
    })
    .map_err(ApiError::from)?;
    Ok(Json(page))
}

async fn search(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SymbolsRequest>,
) -> Result<Json<Paged<SymbolInfo>>, ApiError> {
    let page = tokio::task::block_in_place(|| -> Result<_, EngineError> {
        let pattern = request.pattern.clone().ok_or_else(|| {
            EngineError::InvalidInput("search requires a pattern".to_string())
        })?;
        let filter = filter_from(&request)?;
        let sort = parse_sort(request.sort.as_deref(), request.order.as_deref())?;
        engine.query().search_symbols(
            &pattern,
            &filter,
            sort,
            Page {
                offset: request.offset,
                limit: request.limit,
            },
        )
    })
    .map_err(ApiError::from)?;
    Ok(Json(page))
}

async fn summary(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<ProjectSummary>, ApiError> {
    let summary = tokio::task::block_in_place(|| engine.query().project_summary(request.top))
        .map_err(ApiError::from)?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerSet;
    use crate::engine::EngineOptions;

    fn test_engine() -> Arc<Engine> {
        Arc::new(
            Engine::in_memory(AnalyzerSet::builtin(), EngineOptions::default())
                .expect("engine"),
        )
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn symbols_endpoint_returns_empty_page_on_fresh_index() {
        let engine = test_engine();
        let Json(page) = symbols(State(engine), Json(SymbolsRequest::default()))
            .await
            .expect("page");
        assert_eq!(page.total_count, 0);
        assert!(page.items.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_without_pattern_is_a_bad_request() {
        let engine = test_engine();
        let err = search(State(engine), Json(SymbolsRequest::default()))
            .await
            .err()
            .expect("error");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_sort_order_maps_to_bad_request() {
        let engine = test_engine();
        let request = SymbolsRequest {
            order: Some("upward".to_string()),
            ..Default::default()
        };
        let err = symbols(State(engine), Json(request)).await.err().expect("error");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
