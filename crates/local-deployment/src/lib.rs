use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use driveway::{BatchPolicy, JsonExporter};
use services::services::{
    build_orchestrator::BuildOrchestrator,
    config::{load_config_from_file, save_config_to_file},
    interlocking::InterlockingService,
    toolchain::CargoToolchain,
    topology_import::{CommandRouteProvider, CommandTopologyProvider},
};
use utils::assets::{config_path, generated_dir};

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    orchestrator: BuildOrchestrator,
    interlockings: InterlockingService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let raw_config = load_config_from_file(&config_path()).await;

        // Always save config (may have been defaulted)
        save_config_to_file(&raw_config, &config_path()).await?;

        let db = DBService::new().await?;

        let orchestrator = BuildOrchestrator::new(
            db.clone(),
            Arc::new(CargoToolchain::new(raw_config.toolchain.clone())),
            raw_config.instance.clone(),
        );

        let policy = if raw_config.export.skip_invalid_routes {
            BatchPolicy::SkipFailed
        } else {
            BatchPolicy::AbortOnFirstError
        };
        let interlockings = InterlockingService::new(
            db.clone(),
            Arc::new(CommandTopologyProvider::from_config(&raw_config.import)),
            Arc::new(CommandRouteProvider::from_config(&raw_config.import)),
            Arc::new(JsonExporter::new(policy)),
            orchestrator.clone(),
            generated_dir(),
        );

        tracing::info!(
            workspace = %raw_config.toolchain.workspace_dir,
            protocol = %raw_config.toolchain.protocol,
            ?policy,
            "Local deployment ready"
        );

        Ok(Self {
            db,
            orchestrator,
            interlockings,
        })
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn orchestrator(&self) -> &BuildOrchestrator {
        &self.orchestrator
    }

    fn interlockings(&self) -> &InterlockingService {
        &self.interlockings
    }
}
