//! Route walking: turns a route into the ordered device states that set it

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    DrivewayError, Result,
    document::{DeviceStateCommand, PointPosition, VacancyState},
    signal_state::resolve_signal_state,
    topology::{Edge, Node, Route, Topology},
};

/// What to do with the remaining routes when one fails to compile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    #[default]
    AbortOnFirstError,
    SkipFailed,
}

/// One entry of the routes document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRoute {
    pub id: Uuid,
    pub start_signal: Uuid,
    pub end_signal: Uuid,
    pub maximum_speed: Option<u32>,
    pub states: Vec<DeviceStateCommand>,
}

pub struct RouteStateCompiler<'a> {
    topology: &'a Topology,
}

impl<'a> RouteStateCompiler<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self { topology }
    }

    /// Emit the device states for `route` in traversal order.
    ///
    /// The start signal comes first. Then, edge by edge, the vacancy sections
    /// on the edge (a section spanning several edges is emitted for each of
    /// them, guarded by that edge's main signal) followed by the point positions needed to pass from the
    /// previous node onto the edge and from the edge into the next node.
    pub fn compile(&self, route: &Route) -> Result<Vec<DeviceStateCommand>> {
        let start_signal = self.topology.signal(route.start_signal)?;
        let resolved = resolve_signal_state(start_signal, route.maximum_speed)?;
        let mut commands = vec![DeviceStateCommand::signal(start_signal, resolved)];

        let mut previous_node = self.topology.node(start_signal.previous_node)?;

        for edge_id in &route.edges {
            let edge = self.topology.edge(*edge_id)?;
            let current_node = edge
                .opposite(previous_node.id)
                .ok_or(DrivewayError::Topology {
                    route: route.id,
                    edge: edge.id,
                    previous_node: previous_node.id,
                })
                .and_then(|id| self.topology.node(id))?;

            let guarding_signal = self.guarding_signal(edge)?;
            for section_id in &edge.vacancy_sections {
                let section = self.topology.vacancy_section(*section_id)?;
                commands.push(DeviceStateCommand::VacancySection {
                    uuid: section.id,
                    state: VacancyState::Free,
                    previous_signals: guarding_signal.into_iter().collect(),
                });
            }

            if let Some(position) = point_position(previous_node, current_node.id) {
                commands.push(DeviceStateCommand::point(previous_node.id, position));
            }
            if let Some(position) = point_position(current_node, previous_node.id) {
                commands.push(DeviceStateCommand::point(current_node.id, position));
            }

            previous_node = current_node;
        }

        Ok(commands)
    }

    pub fn compile_route(&self, route: &Route) -> Result<CompiledRoute> {
        let states = self.compile(route)?;
        Ok(CompiledRoute {
            id: route.id,
            start_signal: route.start_signal,
            end_signal: route.end_signal,
            maximum_speed: route.maximum_speed,
            states,
        })
    }

    /// Compile every route of the topology
    pub fn compile_all(&self, policy: BatchPolicy) -> Result<Vec<CompiledRoute>> {
        let mut compiled = Vec::with_capacity(self.topology.routes.len());
        for route in &self.topology.routes {
            match self.compile_route(route) {
                Ok(entry) => compiled.push(entry),
                Err(e) if policy == BatchPolicy::SkipFailed => {
                    tracing::warn!(route_id = %route.id, "Skipping route: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(compiled)
    }

    /// First main signal on the edge; it must fall when the edge's sections get occupied
    fn guarding_signal(&self, edge: &Edge) -> Result<Option<Uuid>> {
        let mut main_signals = Vec::new();
        for signal_id in &edge.signals {
            let signal = self.topology.signal(*signal_id)?;
            if signal.is_main() {
                main_signals.push(signal.id);
            }
        }
        if main_signals.len() > 1 {
            tracing::warn!(
                edge_id = %edge.id,
                count = main_signals.len(),
                "Edge carries several main signals, using the first"
            );
        }
        Ok(main_signals.first().copied())
    }
}

/// Position `switch` must take so that trains can run towards `towards`
fn point_position(switch: &Node, towards: Uuid) -> Option<PointPosition> {
    if switch.connected_on_left == Some(towards) {
        Some(PointPosition::Left)
    } else if switch.connected_on_right == Some(towards) {
        Some(PointPosition::Right)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        signal::{AdditionalSignal, MainAspect, Signal, SignalKind, Zs3Symbol},
        topology::VacancySection,
    };

    /// ```text
    ///                 / l (left)
    ///   s ---- a ---- p
    ///                 \ r (right) ---- m
    /// ```
    struct Layout {
        topology: Topology,
        s: Uuid,
        a: Uuid,
        p: Uuid,
        r: Uuid,
        m: Uuid,
        start: Uuid,
        end: Uuid,
        e_sa: Uuid,
        e_ap: Uuid,
        e_pr: Uuid,
        e_rm: Uuid,
        e_pl: Uuid,
        section: Uuid,
    }

    fn layout() -> Layout {
        let [s, a, p, l, r, m] = [(); 6].map(|_| Uuid::new_v4());
        let [e_sa, e_ap, e_pl, e_pr, e_rm] = [(); 5].map(|_| Uuid::new_v4());
        let (start, end, section) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut topology = Topology::new();
        for id in [s, a, l, r, m] {
            topology.add_node(Node::new(id));
        }
        topology.add_node(Node::new(p).with_left(l).with_right(r));

        topology.add_signal(
            Signal::new(start, SignalKind::Main, s, a)
                .with_name("A1")
                .with_supported_states(vec![MainAspect::Hp0, MainAspect::Hp1, MainAspect::Hp2])
                .with_additional_signal(AdditionalSignal::Zs3 {
                    id: Uuid::new_v4(),
                    symbols: [4u8, 6, 10, 16]
                        .map(|v| Zs3Symbol::try_from(v).unwrap())
                        .to_vec(),
                }),
        );
        topology.add_signal(
            Signal::new(end, SignalKind::Main, r, m).with_supported_states(vec![MainAspect::Ks2]),
        );

        let mut vs = VacancySection::new(section);
        vs.edges = vec![e_sa, e_ap];
        topology.add_vacancy_section(vs);

        topology.add_edge(
            Edge::new(e_sa, s, a)
                .with_signal(start)
                .with_vacancy_section(section),
        );
        // stored against traversal direction on purpose
        topology.add_edge(Edge::new(e_ap, p, a).with_vacancy_section(section));
        topology.add_edge(Edge::new(e_pl, p, l));
        topology.add_edge(Edge::new(e_pr, r, p));
        topology.add_edge(Edge::new(e_rm, r, m).with_signal(end));

        Layout {
            topology,
            s,
            a,
            p,
            r,
            m,
            start,
            end,
            e_sa,
            e_ap,
            e_pr,
            e_rm,
            e_pl,
            section,
        }
    }

    fn route(layout: &Layout, edges: Vec<Uuid>) -> Route {
        Route::new(Uuid::new_v4(), layout.start, layout.end, edges)
    }

    #[test]
    fn emits_signal_sections_and_points_in_traversal_order() {
        let layout = layout();
        let route = route(&layout, vec![layout.e_sa, layout.e_ap, layout.e_pr, layout.e_rm])
            .with_maximum_speed(100);

        let commands = RouteStateCompiler::new(&layout.topology)
            .compile(&route)
            .unwrap();

        assert_eq!(commands.len(), 4);
        match &commands[0] {
            DeviceStateCommand::Signal { uuid, state, name, .. } => {
                assert_eq!(*uuid, layout.start);
                assert_eq!(name.as_deref(), Some("A1"));
                assert_eq!(state.main, MainAspect::Hp2);
                assert_eq!(state.zs3.map(|s| s.value()), Some(10));
            }
            other => panic!("expected start signal first, got {other:?}"),
        }
        assert_eq!(
            commands[1],
            DeviceStateCommand::VacancySection {
                uuid: layout.section,
                state: VacancyState::Free,
                previous_signals: vec![layout.start],
            }
        );
        // same section again for e_ap, which carries no signal
        assert_eq!(
            commands[2],
            DeviceStateCommand::VacancySection {
                uuid: layout.section,
                state: VacancyState::Free,
                previous_signals: vec![],
            }
        );
        assert_eq!(
            commands[3],
            DeviceStateCommand::point(layout.p, PointPosition::Right)
        );
    }

    fn sections_of(commands: &[DeviceStateCommand]) -> Vec<(Uuid, Vec<Uuid>)> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceStateCommand::VacancySection {
                    uuid,
                    previous_signals,
                    ..
                } => Some((*uuid, previous_signals.clone())),
                _ => None,
            })
            .collect()
    }

    /// `s --e1-- a --e2(g)-- b` with one section spanning both edges
    fn spanning_section(extra_signals_on_e2: usize) -> (Topology, Route, Uuid, Vec<Uuid>) {
        let [s, a, b] = [(); 3].map(|_| Uuid::new_v4());
        let [e1, e2, section, start] = [(); 4].map(|_| Uuid::new_v4());

        let mut topology = Topology::new();
        for id in [s, a, b] {
            topology.add_node(Node::new(id));
        }
        topology.add_signal(
            Signal::new(start, SignalKind::Main, s, a).with_supported_states(vec![MainAspect::Ks2]),
        );

        let mut guards = Vec::new();
        let mut e2_edge = Edge::new(e2, a, b).with_vacancy_section(section);
        for _ in 0..=extra_signals_on_e2 {
            let g = Uuid::new_v4();
            topology.add_signal(Signal::new(g, SignalKind::Main, a, b));
            e2_edge = e2_edge.with_signal(g);
            guards.push(g);
        }
        let mut vs = VacancySection::new(section);
        vs.edges = vec![e1, e2];
        topology.add_vacancy_section(vs);
        topology.add_edge(Edge::new(e1, s, a).with_vacancy_section(section));
        topology.add_edge(e2_edge);

        let route = Route::new(Uuid::new_v4(), start, start, vec![e1, e2]);
        (topology, route, section, guards)
    }

    #[test]
    fn section_spanning_edges_keeps_each_edge_guard() {
        let (topology, route, section, guards) = spanning_section(0);

        let commands = RouteStateCompiler::new(&topology).compile(&route).unwrap();
        assert_eq!(
            sections_of(&commands),
            vec![(section, vec![]), (section, vec![guards[0]])]
        );
    }

    #[test]
    fn edge_without_main_signal_leaves_section_unguarded() {
        let (topology, route, section, _) = spanning_section(0);
        let only_e1 = Route::new(route.id, route.start_signal, route.end_signal, vec![route.edges[0]]);

        let commands = RouteStateCompiler::new(&topology).compile(&only_e1).unwrap();
        assert_eq!(sections_of(&commands), vec![(section, vec![])]);
    }

    #[test]
    fn first_of_several_main_signals_guards_the_section() {
        let (topology, route, section, guards) = spanning_section(1);
        assert_eq!(guards.len(), 2);

        let commands = RouteStateCompiler::new(&topology).compile(&route).unwrap();
        assert_eq!(
            sections_of(&commands).last(),
            Some(&(section, vec![guards[0]]))
        );
    }

    #[test]
    fn edge_between_two_switches_sets_both() {
        // x branches right onto y, y is entered through its left branch
        let [s, x, w, y, z, t] = [(); 6].map(|_| Uuid::new_v4());
        let [e_sx, e_xy, e_yt, start] = [(); 4].map(|_| Uuid::new_v4());

        let mut topology = Topology::new();
        for id in [s, w, z, t] {
            topology.add_node(Node::new(id));
        }
        topology.add_node(Node::new(x).with_left(w).with_right(y));
        topology.add_node(Node::new(y).with_left(x).with_right(z));
        topology.add_signal(
            Signal::new(start, SignalKind::Main, s, x).with_supported_states(vec![MainAspect::Ks2]),
        );
        topology.add_edge(Edge::new(e_sx, s, x));
        topology.add_edge(Edge::new(e_xy, x, y));
        topology.add_edge(Edge::new(e_yt, y, t));

        let route = Route::new(Uuid::new_v4(), start, start, vec![e_sx, e_xy, e_yt]);
        let commands = RouteStateCompiler::new(&topology).compile(&route).unwrap();
        assert_eq!(
            commands[1..],
            [
                DeviceStateCommand::point(x, PointPosition::Right),
                DeviceStateCommand::point(y, PointPosition::Left),
            ]
        );
    }

    #[test]
    fn point_is_set_when_entering_from_a_branch() {
        let layout = layout();
        let mut topology = layout.topology.clone();
        // run the other way: m -> r -> p -> a
        let reverse_start = Uuid::new_v4();
        topology.add_signal(
            Signal::new(reverse_start, SignalKind::Main, layout.m, layout.r)
                .with_supported_states(vec![MainAspect::Ks2]),
        );
        let route = Route::new(
            Uuid::new_v4(),
            reverse_start,
            layout.start,
            vec![layout.e_rm, layout.e_pr, layout.e_ap],
        );

        let commands = RouteStateCompiler::new(&topology).compile(&route).unwrap();
        let points: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, DeviceStateCommand::Point { .. }))
            .collect();
        assert_eq!(points.len(), 1);
        assert_eq!(
            *points[0],
            DeviceStateCommand::point(layout.p, PointPosition::Right)
        );
    }

    #[test]
    fn left_branch_is_resolved() {
        let layout = layout();
        let route = route(&layout, vec![layout.e_sa, layout.e_ap, layout.e_pl]);
        let commands = RouteStateCompiler::new(&layout.topology)
            .compile(&route)
            .unwrap();
        assert_eq!(
            commands.last().unwrap(),
            &DeviceStateCommand::point(layout.p, PointPosition::Left)
        );
    }

    #[test]
    fn continuity_break_is_a_topology_error() {
        let layout = layout();
        // skips e_ap, so e_pr does not touch node a
        let route = route(&layout, vec![layout.e_sa, layout.e_pr]);

        match RouteStateCompiler::new(&layout.topology).compile(&route) {
            Err(DrivewayError::Topology {
                edge, previous_node, ..
            }) => {
                assert_eq!(edge, layout.e_pr);
                assert_eq!(previous_node, layout.a);
            }
            other => panic!("expected topology error, got {other:?}"),
        }
    }

    #[test]
    fn every_point_command_names_a_visited_node() {
        let layout = layout();
        let route = route(&layout, vec![layout.e_sa, layout.e_ap, layout.e_pr, layout.e_rm]);
        let visited = [layout.s, layout.a, layout.p, layout.r, layout.m];

        let commands = RouteStateCompiler::new(&layout.topology)
            .compile(&route)
            .unwrap();
        for command in &commands {
            if let DeviceStateCommand::Point { uuid, .. } = command {
                assert!(visited.contains(uuid));
            }
        }
    }

    #[test]
    fn batch_aborts_or_skips_on_failing_route() {
        let layout = layout();
        let mut topology = layout.topology.clone();
        let good = route(&layout, vec![layout.e_sa, layout.e_ap, layout.e_pr]);
        let broken = route(&layout, vec![layout.e_sa, layout.e_rm]);
        topology.add_route(broken);
        topology.add_route(good.clone());

        let compiler = RouteStateCompiler::new(&topology);
        assert!(compiler.compile_all(BatchPolicy::AbortOnFirstError).is_err());

        let compiled = compiler.compile_all(BatchPolicy::SkipFailed).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].id, good.id);
    }

    #[test]
    fn unresolvable_start_signal_aborts_the_route() {
        let layout = layout();
        let mut topology = layout.topology.clone();
        let mute = Uuid::new_v4();
        topology.add_signal(Signal::new(mute, SignalKind::Main, layout.s, layout.a));
        let route = Route::new(Uuid::new_v4(), mute, layout.end, vec![layout.e_sa]);

        let result = RouteStateCompiler::new(&topology).compile(&route);
        assert!(matches!(result, Err(DrivewayError::Configuration { .. })));
    }
}
