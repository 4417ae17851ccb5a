//! Track topology arena
//!
//! Nodes, edges, signals and vacancy sections live in insertion-ordered maps
//! keyed by their id. Every cross reference (edge endpoints, switch adjacency,
//! signal placement, route edges) is stored as an id and looked up here, so the
//! graph never owns its neighbours.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DrivewayError, Result, document::TopologyDocument, import::GeoPoint, signal::Signal};

/// A track node. Switches know which neighbour lies on their left and right branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    #[serde(default)]
    pub connected_on_left: Option<Uuid>,
    #[serde(default)]
    pub connected_on_right: Option<Uuid>,
    #[serde(default)]
    pub geo: Option<GeoPoint>,
}

impl Node {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            connected_on_left: None,
            connected_on_right: None,
            geo: None,
        }
    }

    pub fn with_left(mut self, node: Uuid) -> Self {
        self.connected_on_left = Some(node);
        self
    }

    pub fn with_right(mut self, node: Uuid) -> Self {
        self.connected_on_right = Some(node);
        self
    }

    pub fn with_geo(mut self, geo: GeoPoint) -> Self {
        self.geo = Some(geo);
        self
    }
}

/// A track segment between two nodes. The endpoints are unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub node_a: Uuid,
    pub node_b: Uuid,
    #[serde(default)]
    pub signals: Vec<Uuid>,
    #[serde(default)]
    pub vacancy_sections: Vec<Uuid>,
}

impl Edge {
    pub fn new(id: Uuid, node_a: Uuid, node_b: Uuid) -> Self {
        Self {
            id,
            node_a,
            node_b,
            signals: Vec::new(),
            vacancy_sections: Vec::new(),
        }
    }

    pub fn with_signal(mut self, signal: Uuid) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn with_vacancy_section(mut self, section: Uuid) -> Self {
        self.vacancy_sections.push(section);
        self
    }

    /// The endpoint opposite `node`, or `None` if `node` is not an endpoint
    pub fn opposite(&self, node: Uuid) -> Option<Uuid> {
        if self.node_a == node {
            Some(self.node_b)
        } else if self.node_b == node {
            Some(self.node_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancySection {
    pub id: Uuid,
    #[serde(default)]
    pub edges: Vec<Uuid>,
    /// Main signals that must fall to stop when this section gets occupied
    #[serde(default)]
    pub previous_signals: Vec<Uuid>,
}

impl VacancySection {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            edges: Vec::new(),
            previous_signals: Vec::new(),
        }
    }
}

/// A driveway from a start signal to an end signal along a connected edge chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub start_signal: Uuid,
    pub end_signal: Uuid,
    pub edges: Vec<Uuid>,
    #[serde(default)]
    pub vacancy_sections: Vec<Uuid>,
    /// Speed limit in km/h; `None` means unrestricted
    #[serde(default)]
    pub maximum_speed: Option<u32>,
}

impl Route {
    pub fn new(id: Uuid, start_signal: Uuid, end_signal: Uuid, edges: Vec<Uuid>) -> Self {
        Self {
            id,
            start_signal,
            end_signal,
            edges,
            vacancy_sections: Vec::new(),
            maximum_speed: None,
        }
    }

    pub fn with_maximum_speed(mut self, speed: u32) -> Self {
        self.maximum_speed = Some(speed);
        self
    }
}

/// The complete track layout of an area plus the routes computed over it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TopologyDocument", into = "TopologyDocument")]
pub struct Topology {
    pub nodes: IndexMap<Uuid, Node>,
    pub edges: IndexMap<Uuid, Edge>,
    pub signals: IndexMap<Uuid, Signal>,
    pub vacancy_sections: IndexMap<Uuid, VacancySection>,
    pub routes: Vec<Route>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.insert(edge.id, edge);
    }

    pub fn add_signal(&mut self, signal: Signal) {
        self.signals.insert(signal.id, signal);
    }

    pub fn add_vacancy_section(&mut self, section: VacancySection) {
        self.vacancy_sections.insert(section.id, section);
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn node(&self, id: Uuid) -> Result<&Node> {
        self.nodes.get(&id).ok_or(DrivewayError::UnknownNode(id))
    }

    pub fn edge(&self, id: Uuid) -> Result<&Edge> {
        self.edges.get(&id).ok_or(DrivewayError::UnknownEdge(id))
    }

    pub fn signal(&self, id: Uuid) -> Result<&Signal> {
        self.signals.get(&id).ok_or(DrivewayError::UnknownSignal(id))
    }

    pub fn vacancy_section(&self, id: Uuid) -> Result<&VacancySection> {
        self.vacancy_sections
            .get(&id)
            .ok_or(DrivewayError::UnknownVacancySection(id))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every stored id reference resolves inside this topology
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.values() {
            for neighbour in [node.connected_on_left, node.connected_on_right]
                .into_iter()
                .flatten()
            {
                self.node(neighbour)?;
            }
        }

        for edge in self.edges.values() {
            self.node(edge.node_a)?;
            self.node(edge.node_b)?;
            for signal in &edge.signals {
                self.signal(*signal)?;
            }
            for section in &edge.vacancy_sections {
                self.vacancy_section(*section)?;
            }
        }

        for signal in self.signals.values() {
            self.node(signal.previous_node)?;
            self.node(signal.next_node)?;
        }

        for section in self.vacancy_sections.values() {
            for edge in &section.edges {
                self.edge(*edge)?;
            }
            for signal in &section.previous_signals {
                self.signal(*signal)?;
            }
        }

        for route in &self.routes {
            self.validate_route(route)?;
        }

        Ok(())
    }

    pub fn validate_route(&self, route: &Route) -> Result<()> {
        self.signal(route.start_signal)?;
        self.signal(route.end_signal)?;
        for edge in &route.edges {
            self.edge(*edge)?;
        }
        for section in &route.vacancy_sections {
            self.vacancy_section(*section)?;
        }
        Ok(())
    }
}

impl TryFrom<TopologyDocument> for Topology {
    type Error = DrivewayError;

    fn try_from(document: TopologyDocument) -> Result<Self> {
        let mut topology = Topology::new();
        document.nodes.into_iter().for_each(|n| topology.add_node(n));
        document.edges.into_iter().for_each(|e| topology.add_edge(e));
        document.signals.into_iter().for_each(|s| topology.add_signal(s));
        document
            .vacancy_sections
            .into_iter()
            .for_each(|v| topology.add_vacancy_section(v));
        topology.routes = document.routes;
        topology.validate()?;
        Ok(topology)
    }
}

impl From<Topology> for TopologyDocument {
    fn from(topology: Topology) -> Self {
        TopologyDocument {
            nodes: topology.nodes.into_values().collect(),
            edges: topology.edges.into_values().collect(),
            signals: topology.signals.into_values().collect(),
            vacancy_sections: topology.vacancy_sections.into_values().collect(),
            routes: topology.routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;

    #[test]
    fn opposite_endpoint_is_resolved_in_both_orientations() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let edge = Edge::new(Uuid::new_v4(), a, b);
        assert_eq!(edge.opposite(a), Some(b));
        assert_eq!(edge.opposite(b), Some(a));
        assert_eq!(edge.opposite(Uuid::new_v4()), None);
    }

    #[test]
    fn validate_rejects_dangling_adjacency() {
        let mut topology = Topology::new();
        let missing = Uuid::new_v4();
        topology.add_node(Node::new(Uuid::new_v4()).with_left(missing));

        match topology.validate() {
            Err(DrivewayError::UnknownNode(id)) => assert_eq!(id, missing),
            other => panic!("expected unknown node, got {other:?}"),
        }
    }

    #[test]
    fn document_round_trip_keeps_insertion_order() {
        let mut topology = Topology::new();
        let nodes: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &nodes {
            topology.add_node(Node::new(*id));
        }
        let signal = Signal::new(Uuid::new_v4(), SignalKind::Main, nodes[0], nodes[1]);
        topology.add_edge(Edge::new(Uuid::new_v4(), nodes[0], nodes[1]).with_signal(signal.id));
        topology.add_signal(signal);

        let json = serde_json::to_value(&topology).unwrap();
        assert!(json["nodes"].is_array());

        let parsed: Topology = serde_json::from_value(json).unwrap();
        let order: Vec<Uuid> = parsed.nodes.keys().copied().collect();
        assert_eq!(order, nodes);
        assert_eq!(parsed, topology);
    }

    #[test]
    fn deserializing_rejects_unknown_references() {
        let json = serde_json::json!({
            "nodes": [],
            "edges": [{ "id": Uuid::new_v4(), "node_a": Uuid::new_v4(), "node_b": Uuid::new_v4() }],
            "signals": [],
            "vacancy_sections": []
        });
        assert!(serde_json::from_value::<Topology>(json).is_err());
    }
}
