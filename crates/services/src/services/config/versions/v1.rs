use serde::{Deserialize, Serialize};
use ts_rs::TS;

const CONFIG_VERSION: &str = "v1";

/// External commands that turn the interchange documents into a runnable interlocking
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(default)]
pub struct ToolchainConfig {
    pub codegen_program: String,
    pub codegen_args: Vec<String>,
    pub build_program: String,
    pub build_args: Vec<String>,
    pub clean_args: Vec<String>,
    /// Directory the code generator runs in; generated projects land below it
    pub workspace_dir: String,
    /// Wire protocol the generated instance speaks
    pub protocol: String,
    pub binary_name: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            codegen_program: "cargo".to_string(),
            codegen_args: ["run", "--package", "code_generation", "--"]
                .map(String::from)
                .to_vec(),
            build_program: "cargo".to_string(),
            build_args: ["build", "--release"].map(String::from).to_vec(),
            clean_args: vec!["clean".to_string()],
            workspace_dir: "..".to_string(),
            protocol: "grpc".to_string(),
            binary_name: "ixl".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(default)]
pub struct InstanceConfig {
    /// Address the generated instance binds to
    pub bind_host: String,
    /// Address used to reach the instance from here
    pub probe_host: String,
    pub readiness_timeout_ms: u64,
    pub readiness_poll_interval_ms: u64,
    pub terminate_timeout_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            probe_host: "127.0.0.1".to_string(),
            readiness_timeout_ms: 30_000,
            readiness_poll_interval_ms: 100,
            terminate_timeout_ms: 5_000,
        }
    }
}

/// Map data importer and route generator. Both are unset until configured.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(default)]
pub struct ImportConfig {
    pub topology_program: Option<String>,
    pub topology_args: Vec<String>,
    pub routes_program: Option<String>,
    pub routes_args: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(default)]
pub struct ExportConfig {
    /// Leave failing routes out of the routes document instead of rejecting the request
    pub skip_invalid_routes: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
pub struct Config {
    pub config_version: String,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl From<String> for Config {
    fn from(raw_config: String) -> Self {
        match serde_json::from_str::<Config>(&raw_config) {
            Ok(config) if config.config_version == CONFIG_VERSION => config,
            Ok(config) => {
                tracing::warn!(
                    "Unknown config version {}, using default",
                    config.config_version
                );
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to parse config: {}, using default", e);
                Self::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION.to_string(),
            toolchain: ToolchainConfig::default(),
            instance: InstanceConfig::default(),
            import: ImportConfig::default(),
            export: ExportConfig::default(),
        }
    }
}
