use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use db::{DBService, models::interlocking::Interlocking};
use services::services::{
    build_orchestrator::BuildOrchestrator,
    config::ConfigError,
    interlocking::InterlockingService,
};
use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

/// Everything a request handler may touch, handed in explicitly
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn db(&self) -> &DBService;

    fn orchestrator(&self) -> &BuildOrchestrator;

    fn interlockings(&self) -> &InterlockingService;

    /// Fail records a previous process left generating or running, call at startup
    async fn cleanup_orphan_interlockings(&self) -> Result<(), DeploymentError> {
        let orphans = Interlocking::fail_orphans(&self.db().pool).await?;
        for record in &orphans {
            tracing::info!(
                interlocking_id = record.id,
                port = ?record.port(),
                "Marked orphaned interlocking as failed"
            );
        }
        Ok(())
    }
}
