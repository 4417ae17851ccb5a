//! # Driveway
//!
//! Turns a railway track topology into the device-state instructions a
//! generated interlocking needs for every driveway (route): main signal
//! aspects, Zs3/Zs3v speed indicators, point positions and vacancy sections.
//!
//! ## Pipeline
//!
//! - **Import**: a bounding [`Polygon`] is handed to a [`TopologyProvider`],
//!   and a [`RouteProvider`] fills in the routes
//! - **Resolve**: [`resolve_signal_state`] picks the aspect each start signal shows
//! - **Compile**: [`RouteStateCompiler`] walks a route's edges and emits the
//!   ordered [`DeviceStateCommand`] list
//! - **Export**: an [`Exporter`] serializes routes, topology and placement
//!   into the interchange documents consumed by the code generator

pub mod compiler;
pub mod document;
pub mod import;
pub mod signal;
pub mod signal_state;
pub mod topology;

pub use compiler::{BatchPolicy, CompiledRoute, RouteStateCompiler};
pub use document::{
    DeviceStateCommand, Exporter, JsonExporter, PlacementDocument, PointPosition, RoutesDocument,
    TopologyDocument, VacancyState,
};
pub use import::{GeoPoint, Polygon, RouteProvider, TopologyProvider};
pub use signal::{AdditionalSignal, MainAspect, Signal, SignalKind, Zs3Symbol};
pub use signal_state::{ResolvedSignalState, SupportedSignalStates, resolve_signal_state};
pub use topology::{Edge, Node, Route, Topology, VacancySection};

use uuid::Uuid;

/// Errors raised while importing, validating or compiling a topology
#[derive(Debug, thiserror::Error)]
pub enum DrivewayError {
    #[error("Signal {signal} supports none of Hp1, Hp2 or Ks2")]
    Configuration { signal: Uuid },

    #[error("Route {route} breaks at edge {edge}: neither endpoint is node {previous_node}")]
    Topology {
        route: Uuid,
        edge: Uuid,
        previous_node: Uuid,
    },

    #[error("Import error: {0}")]
    Import(String),

    /// An external importer or route generator could not be run or failed
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Node not found: {0}")]
    UnknownNode(Uuid),

    #[error("Edge not found: {0}")]
    UnknownEdge(Uuid),

    #[error("Signal not found: {0}")]
    UnknownSignal(Uuid),

    #[error("Vacancy section not found: {0}")]
    UnknownVacancySection(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DrivewayError>;
