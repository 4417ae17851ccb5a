pub mod build_orchestrator;
pub mod config;
pub mod interlocking;
pub mod port_registry;
pub mod toolchain;
pub mod topology_import;
