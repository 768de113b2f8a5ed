//! HTTP server exposing the blueprint reader manager.
//!
//! # API Endpoints
//!
//! | Method | Path                 | Description                            |
//! |--------|----------------------|----------------------------------------|
//! | GET    | `/health`            | Health check                           |
//! | GET    | `/api/status`        | Load phase, config and table summary   |
//! | POST   | `/api/load`          | Run a load cycle (409 while one runs)  |
//! | GET    | `/api/tables`        | Registered tables                      |
//! | GET    | `/api/tables/{name}` | Table contents as CSV                  |
//! | GET    | `/api/signals`       | SSE stream of load signals             |
//! | GET    | `/api/logs`          | SSE stream for real-time logs          |

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, LoadResponse, StatusResponse, TableSummary};
use crate::error::{error_chain, ManagerError, ServerResult};
use crate::manager::BlueprintReaderManager;

type ApiError = (StatusCode, Json<Value>);

/// Build the API router around `manager`.
pub fn router(manager: Arc<BlueprintReaderManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/load", post(load))
        .route("/api/tables", get(list_tables))
        .route("/api/tables/{name}", get(table_csv))
        .route("/api/signals", get(sse_signals))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(manager)
}

/// Start the HTTP server
pub async fn start_server(port: u16, manager: Arc<BlueprintReaderManager>) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log_info(format!("Blueprint server running on http://localhost:{}", port));

    axum::serve(listener, router(manager)).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "blueprints",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(manager): State<Arc<BlueprintReaderManager>>) -> Json<StatusResponse> {
    Json(StatusResponse::from_manager(&manager))
}

async fn load(State(manager): State<Arc<BlueprintReaderManager>>) -> Result<Json<LoadResponse>, ApiError> {
    match manager.load_blueprints().await {
        Ok(report) => Ok(Json(report.into())),
        Err(e @ ManagerError::LoadInProgress) => {
            Err((StatusCode::CONFLICT, Json(error_response(&e.to_string()))))
        }
    }
}

async fn list_tables(State(manager): State<Arc<BlueprintReaderManager>>) -> Json<Vec<TableSummary>> {
    let tables = manager
        .registry()
        .tables()
        .iter()
        .map(|t| TableSummary::from_table(t.as_ref()))
        .collect();
    Json(tables)
}

async fn table_csv(
    State(manager): State<Arc<BlueprintReaderManager>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let table = manager.registry().get(&name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(error_response(&format!("Unknown blueprint table: {}", name))),
        )
    })?;

    let csv = table.to_csv().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&error_chain(&e))))
    })?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}

/// SSE endpoint for load signals
async fn sse_signals(
    State(manager): State<Arc<BlueprintReaderManager>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(manager.signals().subscribe()).filter_map(|result| {
        let signal = result.ok()?;
        let json = serde_json::to_string(&signal).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(LOG_BROADCASTER.subscribe()).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
