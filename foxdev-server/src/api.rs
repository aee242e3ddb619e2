//! HTTP API
//!
//! `POST /dev-server` starts (or returns) a project's dev server,
//! `DELETE /dev-server?projectId=` stops it and `GET /dev-server?projectId=`
//! reports its status. `GET /dev-servers` and `GET /health` are for tooling.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use foxdev_core::{
    DevServerStatus, ErrorBody, HelloResponse, ListResponse, StartRequest, StartResponse,
    StatusResponse, StopResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::lifecycle::{DevServerError, LifecycleController};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    DevServer(#[from] DevServerError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DevServer(e) => match e {
                DevServerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                DevServerError::ProjectNotFound(_)
                | DevServerError::NoManifest(_)
                | DevServerError::NotRunning(_) => StatusCode::NOT_FOUND,
                DevServerError::StartInProgress(_) => StatusCode::CONFLICT,
                DevServerError::DependencyInstall(_)
                | DevServerError::Spawn(_)
                | DevServerError::PrematureExit { .. }
                | DevServerError::StartTimeout { .. }
                | DevServerError::Signal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Failed start attempts put the project in the `error` state.
    fn is_start_failure(&self) -> bool {
        matches!(
            self,
            ApiError::DevServer(
                DevServerError::DependencyInstall(_)
                    | DevServerError::Spawn(_)
                    | DevServerError::PrematureExit { .. }
                    | DevServerError::StartTimeout { .. }
            )
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let body = if self.is_start_failure() {
            ErrorBody::start_failed(message)
        } else {
            ErrorBody::new(message)
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectQuery {
    project_id: Option<String>,
}

fn require_project_id(project_id: Option<String>) -> Result<String, ApiError> {
    match project_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError::BadRequest("projectId is required".to_string())),
    }
}

fn project_id_from_query(
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> Result<String, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    require_project_id(query.project_id)
}

pub fn router(controller: Arc<LifecycleController>) -> Router {
    Router::new()
        .route(
            "/dev-server",
            post(start_dev_server)
                .delete(stop_dev_server)
                .get(dev_server_status),
        )
        .route("/dev-servers", get(list_dev_servers))
        .route("/health", get(hello))
        .layer(TraceLayer::new_for_http())
        .with_state(controller)
}

async fn start_dev_server(
    State(controller): State<Arc<LifecycleController>>,
    request: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<StartResponse>, ApiError> {
    let Json(request) = request
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;
    let project_id = require_project_id(request.project_id)?;

    // Runs detached from the request so a client disconnect can't drop a
    // half-started process.
    let outcome = tokio::spawn(async move { controller.start(&project_id).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Start task failed: {e}")))??;

    Ok(Json(StartResponse {
        url: outcome.url,
        pid: outcome.pid,
        status: DevServerStatus::Running,
        cached: outcome.cached,
    }))
}

async fn stop_dev_server(
    State(controller): State<Arc<LifecycleController>>,
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> Result<Json<StopResponse>, ApiError> {
    let project_id = project_id_from_query(query)?;
    controller.stop(&project_id)?;
    Ok(Json(StopResponse {
        success: true,
        message: "Dev server stopped".to_string(),
    }))
}

async fn dev_server_status(
    State(controller): State<Arc<LifecycleController>>,
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let project_id = project_id_from_query(query)?;
    Ok(Json(controller.status(&project_id)?))
}

async fn list_dev_servers(State(controller): State<Arc<LifecycleController>>) -> Json<ListResponse> {
    let servers = controller.list().iter().map(|r| r.info()).collect();
    Json(ListResponse { servers })
}

async fn hello(State(controller): State<Arc<LifecycleController>>) -> Json<HelloResponse> {
    Json(HelloResponse {
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        projects_dir: controller.config().projects_dir.display().to_string(),
    })
}
