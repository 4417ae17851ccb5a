//! Interchange documents handed to the interlocking code generator

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Result,
    compiler::{BatchPolicy, CompiledRoute, RouteStateCompiler},
    signal::{MainAspect, Signal, Zs3Symbol},
    signal_state::{ResolvedSignalState, SupportedSignalStates},
    topology::{Edge, Node, Route, Topology, VacancySection},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointPosition {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacancyState {
    Free,
}

/// Aspect a signal is driven to when its route is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAspect {
    pub main: MainAspect,
    pub zs3: Option<Zs3Symbol>,
    pub zs3v: Option<Zs3Symbol>,
}

/// Target state of one field element while a route is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceStateCommand {
    Signal {
        uuid: Uuid,
        name: Option<String>,
        supported_states: SupportedSignalStates,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        additional: Vec<String>,
        state: SignalAspect,
    },
    Point {
        uuid: Uuid,
        state: PointPosition,
    },
    VacancySection {
        uuid: Uuid,
        state: VacancyState,
        previous_signals: Vec<Uuid>,
    },
}

impl DeviceStateCommand {
    pub fn signal(signal: &Signal, resolved: ResolvedSignalState) -> Self {
        DeviceStateCommand::Signal {
            uuid: signal.id,
            name: signal.name.clone(),
            supported_states: resolved.supported,
            additional: resolved.additional,
            state: SignalAspect {
                main: resolved.main,
                zs3: resolved.zs3,
                zs3v: resolved.zs3v,
            },
        }
    }

    pub fn point(uuid: Uuid, state: PointPosition) -> Self {
        DeviceStateCommand::Point { uuid, state }
    }
}

pub type RoutesDocument = Vec<CompiledRoute>;

/// Plain-list form of a [`Topology`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub vacancy_sections: Vec<VacancySection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePlacement {
    pub uuid: Uuid,
    pub lat: f64,
    pub lon: f64,
}

/// Geographic position of every node that has one, for drawing the track plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementDocument {
    pub nodes: Vec<NodePlacement>,
}

/// Serializes a topology into the three documents the code generator reads
pub trait Exporter: Send + Sync {
    fn export_routes(&self, topology: &Topology) -> Result<RoutesDocument>;

    fn export_topology(&self, topology: &Topology) -> Result<TopologyDocument>;

    fn export_placement(&self, topology: &Topology) -> Result<PlacementDocument>;
}

#[derive(Debug, Clone, Default)]
pub struct JsonExporter {
    policy: BatchPolicy,
}

impl JsonExporter {
    pub fn new(policy: BatchPolicy) -> Self {
        Self { policy }
    }
}

impl Exporter for JsonExporter {
    fn export_routes(&self, topology: &Topology) -> Result<RoutesDocument> {
        RouteStateCompiler::new(topology).compile_all(self.policy)
    }

    fn export_topology(&self, topology: &Topology) -> Result<TopologyDocument> {
        let mut document = TopologyDocument::from(topology.clone());
        document.routes.clear();
        Ok(document)
    }

    fn export_placement(&self, topology: &Topology) -> Result<PlacementDocument> {
        let nodes = topology
            .nodes
            .values()
            .filter_map(|node| {
                node.geo.map(|geo| NodePlacement {
                    uuid: node.id,
                    lat: geo.lat,
                    lon: geo.lon,
                })
            })
            .collect();
        Ok(PlacementDocument { nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{import::GeoPoint, signal::SignalKind};

    #[test]
    fn commands_are_tagged_by_element_type() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(DeviceStateCommand::point(id, PointPosition::Left)).unwrap();
        assert_eq!(json["type"], "point");
        assert_eq!(json["state"], "left");
        assert_eq!(json["uuid"], id.to_string());

        let section = DeviceStateCommand::VacancySection {
            uuid: id,
            state: VacancyState::Free,
            previous_signals: vec![],
        };
        let json = serde_json::to_value(section).unwrap();
        assert_eq!(json["type"], "vacancy_section");
        assert_eq!(json["state"], "free");
    }

    #[test]
    fn placement_skips_nodes_without_coordinates() {
        let mut topology = Topology::new();
        let placed = Uuid::new_v4();
        topology.add_node(Node::new(placed).with_geo(GeoPoint {
            lat: 52.39,
            lon: 13.06,
        }));
        topology.add_node(Node::new(Uuid::new_v4()));

        let placement = JsonExporter::default().export_placement(&topology).unwrap();
        assert_eq!(placement.nodes.len(), 1);
        assert_eq!(placement.nodes[0].uuid, placed);
    }

    #[test]
    fn topology_document_leaves_routes_to_routes_document() {
        let mut topology = Topology::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        topology.add_node(Node::new(a));
        topology.add_node(Node::new(b));
        let signal = Signal::new(Uuid::new_v4(), SignalKind::Main, a, b)
            .with_supported_states(vec![MainAspect::Ks2]);
        let edge = Edge::new(Uuid::new_v4(), a, b).with_signal(signal.id);
        topology.add_route(Route::new(Uuid::new_v4(), signal.id, signal.id, vec![edge.id]));
        topology.add_edge(edge);
        topology.add_signal(signal);

        let exporter = JsonExporter::default();
        let document = exporter.export_topology(&topology).unwrap();
        assert!(document.routes.is_empty());
        assert_eq!(document.edges.len(), 1);
        assert_eq!(exporter.export_routes(&topology).unwrap().len(), 1);
    }
}
