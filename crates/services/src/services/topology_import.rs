//! Topology and route providers backed by external commands

use std::process::Stdio;

use async_trait::async_trait;
use driveway::{
    DrivewayError, Polygon, Result, Route, RouteProvider, Topology, TopologyDocument,
    TopologyProvider,
};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::services::config::ImportConfig;

/// Runs `program args... "<polygon>"` and reads a topology document from stdout
#[derive(Debug, Clone)]
pub struct CommandTopologyProvider {
    program: Option<String>,
    args: Vec<String>,
}

impl CommandTopologyProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: Some(program.into()),
            args,
        }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            program: config.topology_program.clone(),
            args: config.topology_args.clone(),
        }
    }
}

#[async_trait]
impl TopologyProvider for CommandTopologyProvider {
    async fn import(&self, polygon: &Polygon) -> Result<Topology> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| DrivewayError::Provider("No topology importer configured".into()))?;

        let mut command = Command::new(program);
        command
            .kill_on_drop(true)
            .args(&self.args)
            .arg(polygon.to_string())
            .stdin(Stdio::null());

        let stdout = run_to_completion(command, None, "topology importer").await?;
        let topology: Topology = serde_json::from_slice(&stdout)?;
        if topology.is_empty() {
            return Err(DrivewayError::Import(format!(
                "No track found inside polygon {polygon}"
            )));
        }

        tracing::info!(
            nodes = topology.nodes.len(),
            edges = topology.edges.len(),
            signals = topology.signals.len(),
            "Imported topology"
        );
        Ok(topology)
    }
}

/// Pipes the topology document into `program args...` and reads back the route list
#[derive(Debug, Clone)]
pub struct CommandRouteProvider {
    program: Option<String>,
    args: Vec<String>,
}

impl CommandRouteProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: Some(program.into()),
            args,
        }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            program: config.routes_program.clone(),
            args: config.routes_args.clone(),
        }
    }
}

#[async_trait]
impl RouteProvider for CommandRouteProvider {
    async fn generate_routes(&self, mut topology: Topology) -> Result<Topology> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| DrivewayError::Provider("No route generator configured".into()))?;

        let mut document = TopologyDocument::from(topology.clone());
        document.routes.clear();
        let input = serde_json::to_vec(&document)?;

        let mut command = Command::new(program);
        command.kill_on_drop(true).args(&self.args);

        let stdout = run_to_completion(command, Some(input), "route generator").await?;
        let routes: Vec<Route> = serde_json::from_slice(&stdout)?;
        for route in &routes {
            topology.validate_route(route)?;
        }

        tracing::info!(routes = routes.len(), "Generated routes");
        topology.routes = routes;
        Ok(topology)
    }
}

async fn run_to_completion(
    mut command: Command,
    stdin: Option<Vec<u8>>,
    what: &str,
) -> Result<Vec<u8>> {
    let io_error = |e: std::io::Error| DrivewayError::Provider(format!("Failed to run {what}: {e}"));

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(io_error)?;
    let pipe = child.stdin.take();
    // stdout is drained while stdin is still being written
    let feed = async move {
        if let (Some(input), Some(mut pipe)) = (stdin, pipe) {
            pipe.write_all(&input).await?;
            pipe.shutdown().await?;
        }
        Ok::<(), std::io::Error>(())
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());

    let output = output.map_err(io_error)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DrivewayError::Provider(format!(
            "{what} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    match fed {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::debug!("{what} finished without reading all of its input");
        }
        Err(e) => return Err(io_error(e)),
        Ok(()) => {}
    }
    Ok(output.stdout)
}
