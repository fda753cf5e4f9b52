/// HTTP API server for the gateway.
///
/// Exposes start, stop and progress endpoints for maturation runs plus a
/// health check. Handlers delegate to [`MaturationService`].
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::errors::MaturationError;
use crate::maturation::{MaturationService, StartRequest};

/// Shared state between HTTP handlers.
#[derive(Clone)]
pub struct HttpApiState {
    maturation: MaturationService,
}

impl HttpApiState {
    pub fn new(maturation: MaturationService) -> Self {
        Self { maturation }
    }
}

/// Request body for POST /api/maturation/stop.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    pub maturation_id: String,
}

/// Response body for POST /api/maturation/stop.
#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub success: bool,
    pub stopped: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

/// Build the HTTP API router.
fn build_router(state: HttpApiState) -> Router {
    Router::new()
        .route("/api/maturation/start", post(start_handler))
        .route("/api/maturation/stop", post(stop_handler))
        .route("/api/maturation/{id}/progress", get(progress_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

fn error_response(
    status: StatusCode,
    error: &str,
    details: String,
) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            details,
        }),
    )
        .into_response()
}

/// POST /api/maturation/start: validate and launch a run in the background.
async fn start_handler(
    State(state): State<HttpApiState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!("rejected start body: {}", rejection.body_text());
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                rejection.body_text(),
            );
        }
    };

    match state.maturation.start(req).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(MaturationError::Validation(details)) => {
            error_response(StatusCode::BAD_REQUEST, "Invalid request", details)
        }
        Err(MaturationError::Conflict(details)) => {
            warn!("maturation start conflict: {}", details);
            error_response(StatusCode::CONFLICT, "Conflict", details)
        }
        Err(e) => {
            error!("maturation start failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start maturation",
                e.to_string(),
            )
        }
    }
}

/// POST /api/maturation/stop: request a cooperative stop.
async fn stop_handler(
    State(state): State<HttpApiState>,
    body: Result<Json<StopRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                rejection.body_text(),
            );
        }
    };
    let stopped = state.maturation.stop(&req.maturation_id);
    Json(StopResponse {
        success: true,
        stopped,
    })
    .into_response()
}

/// GET /api/maturation/{id}/progress: latest snapshot; unknown ids are not an error.
async fn progress_handler(
    State(state): State<HttpApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.maturation.progress(&id) {
        Some(progress) => Json(json!({"found": true, "progress": progress})),
        None => Json(json!({"found": false})),
    }
}

/// GET /api/health: health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// Start the HTTP API server. Returns the server's join handle.
pub async fn start(
    host: &str,
    port: u16,
    maturation: MaturationService,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = build_router(HttpApiState::new(maturation));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP API server error: {}", e);
        }
    });

    Ok(handle)
}
