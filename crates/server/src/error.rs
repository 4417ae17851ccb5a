use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::interlocking::InterlockingError;
use deployment::DeploymentError;
use driveway::DrivewayError;
use services::services::{
    build_orchestrator::OrchestratorError, config::ConfigError,
    interlocking::InterlockingServiceError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Interlocking(#[from] InterlockingError),
    #[error(transparent)]
    InterlockingService(#[from] InterlockingServiceError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Driveway(#[from] DrivewayError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found: {0}")]
    NotFound(String),
}

fn driveway_status(err: &DrivewayError) -> (StatusCode, &'static str) {
    match err {
        DrivewayError::Import(_) => (StatusCode::BAD_REQUEST, "ImportError"),
        DrivewayError::Configuration { .. } => (StatusCode::BAD_REQUEST, "ConfigurationError"),
        DrivewayError::Topology { .. }
        | DrivewayError::UnknownNode(_)
        | DrivewayError::UnknownEdge(_)
        | DrivewayError::UnknownSignal(_)
        | DrivewayError::UnknownVacancySection(_) => (StatusCode::BAD_REQUEST, "TopologyError"),
        DrivewayError::Provider(_) | DrivewayError::Serialization(_) => {
            (StatusCode::BAD_GATEWAY, "ProviderError")
        }
    }
}

fn store_status(err: &InterlockingError) -> (StatusCode, &'static str) {
    match err {
        InterlockingError::NotFound => (StatusCode::NOT_FOUND, "InterlockingNotFound"),
        InterlockingError::InvalidTransition { .. } => (StatusCode::CONFLICT, "InvalidTransition"),
        InterlockingError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
    }
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Interlocking(e) => store_status(e),
            ApiError::InterlockingService(e) => match e {
                InterlockingServiceError::Driveway(e) => driveway_status(e),
                InterlockingServiceError::Store(e) => store_status(e),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "InterlockingServiceError"),
            },
            ApiError::Orchestrator(e) => match e {
                OrchestratorError::Store(e) => store_status(e),
                OrchestratorError::NotRunning { .. } => (StatusCode::CONFLICT, "NotRunning"),
                OrchestratorError::Runtime(_) => (StatusCode::BAD_GATEWAY, "RuntimeError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "OrchestratorError"),
            },
            ApiError::Driveway(e) => driveway_status(e),
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ConfigError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status();

        let error_message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            _ => format!("{}: {}", error_type, self),
        };
        if status_code.is_server_error() {
            tracing::error!("{}", error_message);
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::models::interlocking::InterlockingState;

    use super::*;

    #[test]
    fn failures_map_to_distinct_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                DrivewayError::Import("polygon".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                InterlockingServiceError::Driveway(DrivewayError::Provider("exit 1".into())).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (InterlockingError::NotFound.into(), StatusCode::NOT_FOUND),
            (
                OrchestratorError::NotRunning {
                    id: 1,
                    state: InterlockingState::Stopped,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                OrchestratorError::Store(InterlockingError::InvalidTransition {
                    from: InterlockingState::Failed,
                    to: InterlockingState::Running,
                })
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                OrchestratorError::Runtime("gone".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status().0, expected, "{error}");
        }
    }

    #[tokio::test]
    async fn error_body_is_an_api_response() {
        let response = ApiError::BadRequest("Missing polygon".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Missing polygon");
    }
}
