//! Code generation and compilation of interlocking projects

use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::services::config::ToolchainConfig;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Failed to start {step}: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{step} exited with {status}: {stderr}")]
    ExitStatus {
        step: &'static str,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Build produced no artifact at {0}")]
    MissingArtifact(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where the generator reads its input and writes its project
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Name of the generated project, relative to the workspace
    pub output_name: String,
    pub routes_path: PathBuf,
    pub topology_path: PathBuf,
    pub placement_path: PathBuf,
    /// `host:port` the generated instance will listen on
    pub addr: String,
}

/// A runnable program produced by [`Toolchain::compile`]
#[derive(Debug, Clone)]
pub struct Artifact {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl Artifact {
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(&self.working_dir);
        command
    }
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Generate the project sources; returns the project directory
    async fn generate(&self, request: &GenerateRequest) -> Result<PathBuf, ToolchainError>;

    /// Compile a generated project and drop its build cache on success
    async fn compile(&self, project_dir: &Path) -> Result<Artifact, ToolchainError>;
}

/// Runs the configured generator and cargo build as child processes
#[derive(Debug, Clone)]
pub struct CargoToolchain {
    config: ToolchainConfig,
}

impl CargoToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    fn workspace_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.workspace_dir)
    }

    async fn run_step(
        step: &'static str,
        mut command: Command,
        working_dir: &Path,
    ) -> Result<(), ToolchainError> {
        tracing::debug!(step, dir = %working_dir.display(), "Running toolchain step");
        let output = command
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ToolchainError::Spawn { step, source })?;

        if !output.status.success() {
            return Err(ToolchainError::ExitStatus {
                step,
                status: output.status,
                stderr: tail(&String::from_utf8_lossy(&output.stderr), 20),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Toolchain for CargoToolchain {
    async fn generate(&self, request: &GenerateRequest) -> Result<PathBuf, ToolchainError> {
        let mut command = Command::new(&self.config.codegen_program);
        command
            .args(&self.config.codegen_args)
            .arg("-o")
            .arg(&request.output_name)
            .arg(&request.routes_path)
            .arg(&self.config.protocol)
            .arg("--addr")
            .arg(&request.addr)
            .arg("--topology")
            .arg(&request.topology_path)
            .arg("--placement")
            .arg(&request.placement_path);

        let workspace = self.workspace_dir();
        Self::run_step("code generation", command, &workspace).await?;
        Ok(workspace.join(&request.output_name))
    }

    async fn compile(&self, project_dir: &Path) -> Result<Artifact, ToolchainError> {
        let mut build = Command::new(&self.config.build_program);
        build.args(&self.config.build_args);
        Self::run_step("build", build, project_dir).await?;

        let built = project_dir
            .join("target")
            .join("release")
            .join(&self.config.binary_name);
        if !tokio::fs::try_exists(&built).await.unwrap_or(false) {
            return Err(ToolchainError::MissingArtifact(built));
        }
        let program = project_dir.join(&self.config.binary_name);
        tokio::fs::rename(&built, &program).await?;

        let mut clean = Command::new(&self.config.build_program);
        clean.args(&self.config.clean_args);
        Self::run_step("clean", clean, project_dir).await?;

        Ok(Artifact {
            program,
            args: Vec::new(),
            working_dir: project_dir.to_path_buf(),
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
