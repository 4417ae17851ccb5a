use std::{env, path::PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "DRIVEWAY_ASSET_DIR";

/// Layout of the generated-artifact folder inside the asset directory.
///
/// ```text
/// generated/
/// ├── {id}_routes.json
/// ├── {id}_topology.json
/// └── {id}_placement.json
/// ```
pub mod generated_structure {
    pub const GENERATED_DIR: &str = "generated";
    pub const ROUTES_SUFFIX: &str = "routes.json";
    pub const TOPOLOGY_SUFFIX: &str = "topology.json";
    pub const PLACEMENT_SUFFIX: &str = "placement.json";
}

pub fn asset_dir() -> PathBuf {
    let path = if let Ok(custom_dir) = env::var(ASSET_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("org", "driveway", "interlocking-builder")
            .expect("OS didn't give us a home directory")
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("Failed to create asset directory");
    }

    path
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

/// Directory holding the interchange documents handed to the code generator
pub fn generated_dir() -> PathBuf {
    asset_dir().join(generated_structure::GENERATED_DIR)
}

/// Paths of the three interchange documents for one interlocking record
pub fn document_paths(base: &std::path::Path, id: i64) -> (PathBuf, PathBuf, PathBuf) {
    use generated_structure::*;
    (
        base.join(format!("{id}_{ROUTES_SUFFIX}")),
        base.join(format!("{id}_{TOPOLOGY_SUFFIX}")),
        base.join(format!("{id}_{PLACEMENT_SUFFIX}")),
    )
}
