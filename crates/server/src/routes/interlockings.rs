use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::interlocking::Interlocking;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::interlocking::InterlockingStatus;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct CreateInterlockingRequest {
    pub polygon: String,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub polygon: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, TS)]
pub struct InterlockingCreated {
    pub id: i64,
}

async fn start(
    deployment: &DeploymentImpl,
    polygon: &str,
    title: Option<String>,
) -> Result<InterlockingCreated, ApiError> {
    let record = deployment.interlockings().request(polygon, title).await?;
    Ok(InterlockingCreated { id: record.id })
}

pub async fn create_interlocking(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateInterlockingRequest>,
) -> Result<ResponseJson<ApiResponse<InterlockingCreated>>, ApiError> {
    let created = start(&deployment, &payload.polygon, payload.title).await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

/// `GET /run?polygon=...`, kept for clients of the old query-string interface
pub async fn run_interlocking(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<RunQuery>,
) -> Result<ResponseJson<ApiResponse<InterlockingCreated>>, ApiError> {
    let polygon = query
        .polygon
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing polygon".to_string()))?;
    let created = start(&deployment, &polygon, query.title).await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

pub async fn get_running(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Interlocking>>>, ApiError> {
    let running = deployment.interlockings().running().await?;
    Ok(ResponseJson(ApiResponse::success(running)))
}

pub async fn get_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<InterlockingStatus>>, ApiError> {
    let status = deployment.interlockings().status(id).await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn terminate_interlocking(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<InterlockingStatus>>, ApiError> {
    let record = deployment.orchestrator().terminate(id).await?;
    Ok(ResponseJson(ApiResponse::success(InterlockingStatus::from(
        &record,
    ))))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/interlockings",
            get(get_running).post(create_interlocking),
        )
        .route("/interlockings/{id}", get(get_status))
        .route("/interlockings/{id}/terminate", post(terminate_interlocking))
        .route("/run", get(run_interlocking))
        .route("/status/{id}", get(get_status))
}
