//! Build, launch and supervision of generated interlocking instances
//!
//! Every record gets one background task that walks it through
//! `Generating -> Running -> Stopped`. Any error on the way is logged and
//! recorded as `Failed`; nothing is retried. Writes go through
//! [`Interlocking::transition`], which refuses to leave a terminal state, so a
//! late writer (the supervisor seeing an exit after a terminate call, say)
//! cannot move a record backwards.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use command_group::{AsyncCommandGroup, AsyncGroupChild};
use db::{
    DBService,
    models::interlocking::{Interlocking, InterlockingError, InterlockingState},
};
use thiserror::Error;
use tokio::task::JoinHandle;
use utils::port::is_service_running;

use crate::services::{
    config::InstanceConfig,
    port_registry::PortRegistry,
    toolchain::{Artifact, GenerateRequest, Toolchain, ToolchainError},
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error(transparent)]
    Store(#[from] InterlockingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Interlocking {id} is {state}, not running")]
    NotRunning { id: i64, state: InterlockingState },
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(e: sqlx::Error) -> Self {
        OrchestratorError::Store(InterlockingError::Database(e))
    }
}

/// The three documents the code generator reads for one record
#[derive(Debug, Clone)]
pub struct InterchangeDocuments {
    pub routes: PathBuf,
    pub topology: PathBuf,
    pub placement: PathBuf,
}

impl InterchangeDocuments {
    pub fn for_record(base: &std::path::Path, id: i64) -> Self {
        let (routes, topology, placement) = utils::assets::document_paths(base, id);
        Self {
            routes,
            topology,
            placement,
        }
    }
}

#[derive(Clone)]
pub struct BuildOrchestrator {
    db: DBService,
    toolchain: Arc<dyn Toolchain>,
    ports: PortRegistry,
    instance: InstanceConfig,
    http: reqwest::Client,
}

impl BuildOrchestrator {
    pub fn new(db: DBService, toolchain: Arc<dyn Toolchain>, instance: InstanceConfig) -> Self {
        Self {
            db,
            toolchain,
            ports: PortRegistry::new(),
            instance,
            http: reqwest::Client::new(),
        }
    }

    pub async fn allocate_port(&self) -> Result<u16, OrchestratorError> {
        Ok(self.ports.allocate().await?)
    }

    /// Generate and compile the interlocking for `record`. A failing step
    /// leaves whatever it produced on disk.
    pub async fn build(
        &self,
        record: &Interlocking,
        documents: &InterchangeDocuments,
        port: u16,
    ) -> Result<Artifact, OrchestratorError> {
        let request = GenerateRequest {
            output_name: format!("ixl_{}", record.id),
            routes_path: documents.routes.clone(),
            topology_path: documents.topology.clone(),
            placement_path: documents.placement.clone(),
            addr: format!("{}:{}", self.instance.bind_host, port),
        };

        tracing::info!(interlocking_id = record.id, port, "Generating interlocking");
        let project_dir = self.toolchain.generate(&request).await?;

        tracing::info!(interlocking_id = record.id, dir = %project_dir.display(), "Compiling interlocking");
        let artifact = self.toolchain.compile(&project_dir).await?;
        Ok(artifact)
    }

    /// Start the artifact and wait until it accepts connections on `port`,
    /// then record the instance as running
    pub async fn run(
        &self,
        record: &Interlocking,
        artifact: &Artifact,
        port: u16,
    ) -> Result<AsyncGroupChild, OrchestratorError> {
        let mut child = artifact.command().group_spawn()?;
        tracing::info!(
            interlocking_id = record.id,
            pid = ?child.id(),
            "Started interlocking process"
        );

        if let Err(e) = self.wait_until_ready(&mut child, port).await {
            if child.try_wait()?.is_none() {
                child.kill().await?;
            }
            return Err(e);
        }

        Interlocking::mark_running(&self.db.pool, record.id, port).await?;
        tracing::info!(interlocking_id = record.id, port, "Interlocking running");
        Ok(child)
    }

    async fn wait_until_ready(
        &self,
        child: &mut AsyncGroupChild,
        port: u16,
    ) -> Result<(), OrchestratorError> {
        let timeout = Duration::from_millis(self.instance.readiness_timeout_ms);
        let interval = Duration::from_millis(self.instance.readiness_poll_interval_ms);
        let started = Instant::now();

        loop {
            if let Some(status) = child.try_wait()? {
                return Err(OrchestratorError::Runtime(format!(
                    "process exited with {status} before accepting connections"
                )));
            }
            if is_service_running(&self.instance.probe_host, port).await {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(OrchestratorError::Runtime(format!(
                    "no listener on port {port} after {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Block until the instance exits, then record it as stopped
    pub async fn supervise(
        &self,
        record: &Interlocking,
        mut child: AsyncGroupChild,
    ) -> Result<Interlocking, OrchestratorError> {
        let status = child.wait().await?;
        if status.success() {
            tracing::info!(interlocking_id = record.id, "Interlocking exited");
        } else {
            tracing::warn!(interlocking_id = record.id, %status, "Interlocking exited abnormally");
        }
        self.settle(record.id, InterlockingState::Stopped).await
    }

    /// Ask a running instance to shut itself down.
    ///
    /// A response stops the record. The instance may exit while answering, so
    /// a dropped connection also stops it once nothing listens on the port
    /// any more. Unreachable, unanswering or still-listening instances are
    /// failed.
    pub async fn terminate(&self, id: i64) -> Result<Interlocking, OrchestratorError> {
        let record = Interlocking::find_by_id(&self.db.pool, id)
            .await?
            .ok_or(InterlockingError::NotFound)?;
        let port = match (record.state, record.port()) {
            (InterlockingState::Running, Some(port)) => port,
            (state, _) => return Err(OrchestratorError::NotRunning { id, state }),
        };

        let url = format!("http://{}:{}/terminate", self.instance.probe_host, port);
        let result = self
            .http
            .get(&url)
            .timeout(Duration::from_millis(self.instance.terminate_timeout_ms))
            .send()
            .await;

        match result {
            Ok(response) => {
                tracing::info!(interlocking_id = id, status = %response.status(), "Terminate delivered");
                self.settle(id, InterlockingState::Stopped).await
            }
            Err(e) if e.is_connect() => {
                tracing::error!(interlocking_id = id, "Interlocking unreachable at {}: {}", url, e);
                self.settle(id, InterlockingState::Failed).await
            }
            Err(e) if e.is_timeout() => {
                tracing::error!(interlocking_id = id, "Interlocking did not answer terminate: {}", e);
                self.settle(id, InterlockingState::Failed).await
            }
            Err(e) if is_service_running(&self.instance.probe_host, port).await => {
                tracing::error!(interlocking_id = id, "Terminate not delivered, instance still listening: {}", e);
                self.settle(id, InterlockingState::Failed).await
            }
            Err(e) => {
                tracing::info!(interlocking_id = id, "Connection dropped after terminate: {}", e);
                self.settle(id, InterlockingState::Stopped).await
            }
        }
    }

    /// Build, run and supervise `record` to completion. Never returns an
    /// error: failures end up in the store.
    pub async fn execute(&self, record: Interlocking, documents: InterchangeDocuments) {
        let port = match self.allocate_port().await {
            Ok(port) => port,
            Err(e) => {
                self.fail(&record, e).await;
                return;
            }
        };

        let result = async {
            let artifact = self.build(&record, &documents, port).await?;
            let child = self.run(&record, &artifact, port).await?;
            self.supervise(&record, child).await
        }
        .await;

        if let Err(e) = result {
            self.fail(&record, e).await;
        }
        self.ports.release(port).await;
    }

    /// Run [`Self::execute`] in the background; the caller only polls the store
    pub fn spawn(&self, record: Interlocking, documents: InterchangeDocuments) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.execute(record, documents).await })
    }

    async fn fail(&self, record: &Interlocking, error: OrchestratorError) {
        tracing::error!(interlocking_id = record.id, "Interlocking failed: {}", error);
        if let Err(e) = self.settle(record.id, InterlockingState::Failed).await {
            tracing::error!(
                interlocking_id = record.id,
                "Failed to record failure: {}",
                e
            );
        }
    }

    /// Transition to `to`; a record that already reached a terminal state is
    /// returned unchanged
    async fn settle(
        &self,
        id: i64,
        to: InterlockingState,
    ) -> Result<Interlocking, OrchestratorError> {
        match Interlocking::transition(&self.db.pool, id, to).await {
            Ok(record) => {
                tracing::info!(interlocking_id = id, state = %to, "Interlocking state changed");
                Ok(record)
            }
            Err(InterlockingError::InvalidTransition { from, .. }) if from.is_terminal() => {
                tracing::debug!(interlocking_id = id, state = %from, "Interlocking already settled");
                Interlocking::find_by_id(&self.db.pool, id)
                    .await?
                    .ok_or(OrchestratorError::Store(InterlockingError::NotFound))
            }
            Err(e) => Err(e.into()),
        }
    }
}
