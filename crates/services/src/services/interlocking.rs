//! Request path: polygon in, record id out, build continuing in the background

use std::{path::PathBuf, sync::Arc};

use db::{
    DBService,
    models::interlocking::{CreateInterlocking, Interlocking, InterlockingError, InterlockingState},
};
use driveway::{DrivewayError, Exporter, Polygon, RouteProvider, TopologyProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::services::build_orchestrator::{BuildOrchestrator, InterchangeDocuments};

const DEFAULT_TITLE: &str = "untitled";

#[derive(Debug, Error)]
pub enum InterlockingServiceError {
    #[error(transparent)]
    Driveway(#[from] DrivewayError),
    #[error(transparent)]
    Store(#[from] InterlockingError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for InterlockingServiceError {
    fn from(e: sqlx::Error) -> Self {
        InterlockingServiceError::Store(InterlockingError::Database(e))
    }
}

/// What a client polls for. The port is only reported while the instance runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct InterlockingStatus {
    pub id: i64,
    pub state: InterlockingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl From<&Interlocking> for InterlockingStatus {
    fn from(record: &Interlocking) -> Self {
        Self {
            id: record.id,
            state: record.state,
            port: match record.state {
                InterlockingState::Running => record.port(),
                _ => None,
            },
        }
    }
}

#[derive(Clone)]
pub struct InterlockingService {
    db: DBService,
    topology_provider: Arc<dyn TopologyProvider>,
    route_provider: Arc<dyn RouteProvider>,
    exporter: Arc<dyn Exporter>,
    orchestrator: BuildOrchestrator,
    generated_dir: PathBuf,
}

impl InterlockingService {
    pub fn new(
        db: DBService,
        topology_provider: Arc<dyn TopologyProvider>,
        route_provider: Arc<dyn RouteProvider>,
        exporter: Arc<dyn Exporter>,
        orchestrator: BuildOrchestrator,
        generated_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            topology_provider,
            route_provider,
            exporter,
            orchestrator,
            generated_dir,
        }
    }

    /// Import the area, compile its routes and hand the documents to the
    /// orchestrator. Import and compile errors are returned to the caller;
    /// anything after the record exists is only visible through its state.
    pub async fn request(
        &self,
        polygon: &str,
        title: Option<String>,
    ) -> Result<Interlocking, InterlockingServiceError> {
        let polygon = Polygon::parse(polygon)?;
        let topology = self.topology_provider.import(&polygon).await?;
        let topology = self.route_provider.generate_routes(topology).await?;

        let routes = serde_json::to_vec_pretty(&self.exporter.export_routes(&topology)?)?;
        let topology_doc = serde_json::to_vec_pretty(&self.exporter.export_topology(&topology)?)?;
        let placement = serde_json::to_vec_pretty(&self.exporter.export_placement(&topology)?)?;

        let record = Interlocking::create(
            &self.db.pool,
            &CreateInterlocking {
                title: title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            },
        )
        .await?;
        tracing::info!(
            interlocking_id = record.id,
            routes = topology.routes.len(),
            "Created interlocking"
        );

        let documents = InterchangeDocuments::for_record(&self.generated_dir, record.id);
        if let Err(e) = self
            .write_documents(&documents, &routes, &topology_doc, &placement)
            .await
        {
            tracing::error!(interlocking_id = record.id, "Failed to write documents: {}", e);
            Interlocking::transition(&self.db.pool, record.id, InterlockingState::Failed).await?;
            return Err(e.into());
        }

        self.orchestrator.spawn(record.clone(), documents);
        Ok(record)
    }

    async fn write_documents(
        &self,
        documents: &InterchangeDocuments,
        routes: &[u8],
        topology: &[u8],
        placement: &[u8],
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.generated_dir).await?;
        tokio::fs::write(&documents.routes, routes).await?;
        tokio::fs::write(&documents.topology, topology).await?;
        tokio::fs::write(&documents.placement, placement).await?;
        Ok(())
    }

    pub async fn status(&self, id: i64) -> Result<InterlockingStatus, InterlockingServiceError> {
        let record = Interlocking::find_by_id(&self.db.pool, id)
            .await?
            .ok_or(InterlockingError::NotFound)?;
        Ok(InterlockingStatus::from(&record))
    }

    pub async fn running(&self) -> Result<Vec<Interlocking>, InterlockingServiceError> {
        Ok(Interlocking::find_running(&self.db.pool).await?)
    }
}
