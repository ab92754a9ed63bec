//! JSON API over the pipeline.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::pipeline::{FormattedResult, Pipeline, PipelineError, EXAMPLE_QUESTIONS};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/tables", get(tables))
        .route("/examples", get(examples))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

/// Serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, pipeline: Arc<Pipeline>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, model = pipeline.model().name(), "listening");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExamplesResponse {
    pub questions: Vec<&'static str>,
}

/// Error body `{"error": ...}` with a status picked by failure kind.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::EmptyQuestion => StatusCode::BAD_REQUEST,
            PipelineError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Model { .. } => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<FormattedResult>, ApiError> {
    match state.pipeline.run(&req.question).await {
        Ok(run) => Ok(Json(run.formatted())),
        Err(err) => {
            error!(error = %err, "question failed");
            Err(err.into())
        }
    }
}

pub async fn tables(State(state): State<AppState>) -> Result<Json<TablesResponse>, ApiError> {
    let tables = state
        .pipeline
        .database()
        .usable_table_names()
        .await
        .map_err(|err| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        })?;
    Ok(Json(TablesResponse { tables }))
}

pub async fn examples() -> Json<ExamplesResponse> {
    Json(ExamplesResponse {
        questions: EXAMPLE_QUESTIONS.to_vec(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model": state.pipeline.model().name(),
    }))
}
