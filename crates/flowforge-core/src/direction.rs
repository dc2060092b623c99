//! C2 — Direction Resolver: classify ports, orient conduits from direct
//! port-pair evidence, then resolve the two remaining ambiguities (pipe
//! junctions/pumps, belt-to-belt chains) by monotone fixed-point iteration.
//! Grounded directly on the original implementation's `_component_direction`
//! and the three-pass direction resolution in `save_parser.py`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::builder::{PortIndex, PortOwner, RawConnection};
use crate::diagnostics::Diagnostics;
use crate::graph::ProductionGraph;
use crate::id::{ConduitId, MachineId};

/// A port's classified role, per spec.md §4.2's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClass {
    ProducerOutput,
    ProducerInput,
    /// A belt's receiving end (`ConveyorAny0`) — items enter the belt here.
    BeltIn,
    /// A belt's delivering end (`ConveyorAny1`) — items leave the belt here.
    BeltOut,
    /// `PipelineConnection<n>` or a pump/junction's `Connection<n>` —
    /// direction is not recoverable from the name alone.
    PipeEndpoint,
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Classify a raw component/port name into one of the five classes of
/// spec.md §4.2, or `None` for non-connection components (inventories,
/// power, legs).
pub fn classify_port(component_name: &str) -> Option<PortClass> {
    let name = component_name.rsplit('.').next().unwrap_or(component_name);
    let low = name.to_ascii_lowercase();

    if name == "ConveyorAny0" {
        return Some(PortClass::BeltIn);
    }
    if name == "ConveyorAny1" {
        return Some(PortClass::BeltOut);
    }
    if low.starts_with("pipelineconnection") {
        return Some(PortClass::PipeEndpoint);
    }
    if let Some(rest) = low.strip_prefix("input") {
        if is_all_digits(rest) {
            return Some(PortClass::ProducerInput);
        }
    }
    if low.starts_with("pipeinputfactory") {
        return Some(PortClass::ProducerInput);
    }
    if let Some(rest) = low.strip_prefix("output") {
        if is_all_digits(rest) {
            return Some(PortClass::ProducerOutput);
        }
    }
    if low.starts_with("pipeoutputfactory") {
        return Some(PortClass::ProducerOutput);
    }
    if let Some(rest) = low.strip_prefix("connection") {
        if is_all_digits(rest) {
            return Some(PortClass::PipeEndpoint);
        }
    }
    None
}

const PIPE_PROPAGATION_MAX_ITER: usize = 100;
const BELT_PROPAGATION_MAX_ITER: usize = 200;

/// Resolve every conduit's direction in place: direct edges, then the pipe
/// and belt-chain fixed points, then registration of incoming/outgoing
/// adjacency (spec.md §4.2).
pub fn resolve_direction(
    graph: &mut ProductionGraph,
    ports: &PortIndex,
    connections: &[RawConnection],
    diagnostics: &mut Diagnostics,
) {
    resolve_direct_edges(graph, ports, connections);

    let (pipe_machine_edges, pipe_pipe_count) = collect_pipe_ambiguous(ports, connections);
    diagnostics.pipe_propagation_iterations =
        propagate_pipe_direction(graph, &pipe_machine_edges);
    let _ = pipe_pipe_count; // collected per spec.md §9 restraint, intentionally not propagated

    let belt_adj = collect_belt_chain(ports, connections);
    diagnostics.belt_propagation_iterations = propagate_belt_chain(graph, &belt_adj);

    let ids: Vec<ConduitId> = graph.conduits.keys().collect();
    for id in ids {
        graph.register_orientation(id);
    }

    diagnostics.unoriented_conduits = graph.unoriented_conduit_count();
    debug!(
        oriented = graph.oriented_conduit_count(),
        unoriented = diagnostics.unoriented_conduits,
        "C2 direction resolved"
    );
}

/// Direct edges: producer-output <-> belt-in/pipe-endpoint sets `src`;
/// producer-input <-> belt-out/pipe-endpoint sets `dst` (spec.md §4.2
/// "Direct edges"). Consolidates the original's separate
/// belt-endpoint / pipe-ambiguity branches into one rule, since both reduce
/// to "the producer port's own class decides the role regardless of what
/// the far end's exact class is, as long as it isn't another producer port."
fn resolve_direct_edges(graph: &mut ProductionGraph, ports: &PortIndex, connections: &[RawConnection]) {
    for conn in connections {
        let owner_a = ports.owner.get(&conn.0).copied();
        let owner_b = ports.owner.get(&conn.1).copied();
        let class_a = ports.class.get(&conn.0).copied();
        let class_b = ports.class.get(&conn.1).copied();

        let (machine, machine_class, conduit, conduit_class) = match (owner_a, owner_b) {
            (Some(PortOwner::Machine(m)), Some(PortOwner::Conduit(c))) => (m, class_a, c, class_b),
            (Some(PortOwner::Conduit(c)), Some(PortOwner::Machine(m))) => (m, class_b, c, class_a),
            _ => continue,
        };

        match (machine_class, conduit_class) {
            (Some(PortClass::ProducerOutput), Some(PortClass::BeltIn | PortClass::PipeEndpoint)) => {
                let c = graph.conduit_mut(conduit).unwrap();
                if c.src.is_none() {
                    c.src = Some(machine);
                }
            }
            (Some(PortClass::ProducerInput), Some(PortClass::BeltOut | PortClass::PipeEndpoint)) => {
                let c = graph.conduit_mut(conduit).unwrap();
                if c.dst.is_none() {
                    c.dst = Some(machine);
                }
            }
            _ => {}
        }
    }
}

fn collect_pipe_ambiguous(
    ports: &PortIndex,
    connections: &[RawConnection],
) -> (Vec<(ConduitId, MachineId)>, usize) {
    let mut pipe_machine = Vec::new();
    let mut pipe_pipe_count = 0usize;

    for conn in connections {
        let owner_a = ports.owner.get(&conn.0).copied();
        let owner_b = ports.owner.get(&conn.1).copied();
        let class_a = ports.class.get(&conn.0).copied();
        let class_b = ports.class.get(&conn.1).copied();

        if class_a != Some(PortClass::PipeEndpoint) || class_b != Some(PortClass::PipeEndpoint) {
            continue;
        }

        match (owner_a, owner_b) {
            (Some(PortOwner::Conduit(p)), Some(PortOwner::Machine(m)))
            | (Some(PortOwner::Machine(m)), Some(PortOwner::Conduit(p))) => {
                pipe_machine.push((p, m));
            }
            (Some(PortOwner::Conduit(_)), Some(PortOwner::Conduit(_))) => {
                pipe_pipe_count += 1;
            }
            _ => {}
        }
    }

    (pipe_machine, pipe_pipe_count)
}

/// Iteratively resolve pipe direction through junctions/pumps (spec.md §4.2
/// "Pipe ambiguity"). Monotone: only fills an unknown endpoint, never
/// clears one, so it always reaches a fixed point.
fn propagate_pipe_direction(
    graph: &mut ProductionGraph,
    edges: &[(ConduitId, MachineId)],
) -> usize {
    let mut iterations = 0;
    let mut changed = true;
    while changed && iterations < PIPE_PROPAGATION_MAX_ITER {
        changed = false;
        iterations += 1;
        for &(pipe_id, machine_id) in edges {
            let (src, dst) = {
                let c = graph.conduit(pipe_id).unwrap();
                (c.src, c.dst)
            };
            if src.is_some() && dst.is_none() {
                graph.conduit_mut(pipe_id).unwrap().dst = Some(machine_id);
                changed = true;
            } else if dst.is_some() && src.is_none() {
                graph.conduit_mut(pipe_id).unwrap().src = Some(machine_id);
                changed = true;
            }
        }
    }
    iterations
}

#[derive(Debug, Clone, Copy)]
struct BeltLink {
    neighbor: ConduitId,
    forward: bool,
}

fn collect_belt_chain(
    ports: &PortIndex,
    connections: &[RawConnection],
) -> BTreeMap<ConduitId, Vec<BeltLink>> {
    let mut adj: BTreeMap<ConduitId, Vec<BeltLink>> = BTreeMap::new();

    for conn in connections {
        let owner_a = ports.owner.get(&conn.0).copied();
        let owner_b = ports.owner.get(&conn.1).copied();
        let (a, b) = match (owner_a, owner_b) {
            (Some(PortOwner::Conduit(a)), Some(PortOwner::Conduit(b))) => (a, b),
            _ => continue,
        };
        let class_a = ports.class.get(&conn.0).copied();
        let class_b = ports.class.get(&conn.1).copied();

        match (class_a, class_b) {
            (Some(PortClass::BeltOut), Some(PortClass::BeltIn)) => {
                adj.entry(a).or_default().push(BeltLink { neighbor: b, forward: true });
                adj.entry(b).or_default().push(BeltLink { neighbor: a, forward: false });
            }
            (Some(PortClass::BeltIn), Some(PortClass::BeltOut)) => {
                adj.entry(a).or_default().push(BeltLink { neighbor: b, forward: false });
                adj.entry(b).or_default().push(BeltLink { neighbor: a, forward: true });
            }
            _ => {}
        }
    }

    adj
}

/// Iteratively propagate `src`/`dst` through belt-to-belt chains (spec.md
/// §4.2 "Belt chain propagation").
fn propagate_belt_chain(
    graph: &mut ProductionGraph,
    adj: &BTreeMap<ConduitId, Vec<BeltLink>>,
) -> usize {
    let mut iterations = 0;
    let mut changed = true;
    while changed && iterations < BELT_PROPAGATION_MAX_ITER {
        changed = false;
        iterations += 1;
        for (&belt_id, links) in adj {
            for link in links {
                let neighbor_id = link.neighbor;
                if link.forward {
                    let belt_src = graph.conduit(belt_id).unwrap().src;
                    let neighbor_src = graph.conduit(neighbor_id).unwrap().src;
                    if belt_src.is_some() && neighbor_src.is_none() {
                        graph.conduit_mut(neighbor_id).unwrap().src = belt_src;
                        changed = true;
                    }
                    let neighbor_dst = graph.conduit(neighbor_id).unwrap().dst;
                    let belt_dst = graph.conduit(belt_id).unwrap().dst;
                    if neighbor_dst.is_some() && belt_dst.is_none() {
                        graph.conduit_mut(belt_id).unwrap().dst = neighbor_dst;
                        changed = true;
                    }
                } else {
                    let neighbor_src = graph.conduit(neighbor_id).unwrap().src;
                    let belt_src = graph.conduit(belt_id).unwrap().src;
                    if neighbor_src.is_some() && belt_src.is_none() {
                        graph.conduit_mut(belt_id).unwrap().src = neighbor_src;
                        changed = true;
                    }
                    let belt_dst = graph.conduit(belt_id).unwrap().dst;
                    let neighbor_dst = graph.conduit(neighbor_id).unwrap().dst;
                    if belt_dst.is_some() && neighbor_dst.is_none() {
                        graph.conduit_mut(neighbor_id).unwrap().dst = belt_dst;
                        changed = true;
                    }
                }
            }
        }
    }
    iterations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_graph, RawConduit, RawMachine, RawPort};
    use crate::recipe::RecipeDatabase;

    #[test]
    fn classify_known_ports() {
        assert_eq!(classify_port("Output0"), Some(PortClass::ProducerOutput));
        assert_eq!(classify_port("Input2"), Some(PortClass::ProducerInput));
        assert_eq!(classify_port("PipeOutputFactory"), Some(PortClass::ProducerOutput));
        assert_eq!(classify_port("PipeInputFactory1"), Some(PortClass::ProducerInput));
        assert_eq!(classify_port("ConveyorAny0"), Some(PortClass::BeltIn));
        assert_eq!(classify_port("ConveyorAny1"), Some(PortClass::BeltOut));
        assert_eq!(classify_port("PipelineConnection0"), Some(PortClass::PipeEndpoint));
        assert_eq!(classify_port("Connection3"), Some(PortClass::PipeEndpoint));
        assert_eq!(classify_port("InventoryPotential"), None);
        assert_eq!(classify_port("OutputNotANumber"), None);
    }

    fn miner(id: &str) -> RawMachine {
        RawMachine {
            id: id.into(),
            class_name: "Build_MinerMk1_C".into(),
            position: (0.0, 0.0, 0.0),
            ports: vec![RawPort { port_id: format!("{id}.Output0"), component_name: "Output0".into() }],
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
        }
    }

    fn producer(id: &str) -> RawMachine {
        RawMachine {
            id: id.into(),
            class_name: "Build_SmelterMk1_C".into(),
            position: (0.0, 0.0, 0.0),
            ports: vec![RawPort { port_id: format!("{id}.Input0"), component_name: "Input0".into() }],
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
        }
    }

    fn belt(id: &str) -> RawConduit {
        RawConduit {
            id: id.into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            ports: vec![
                RawPort { port_id: format!("{id}.in"), component_name: "ConveyorAny0".into() },
                RawPort { port_id: format!("{id}.out"), component_name: "ConveyorAny1".into() },
            ],
        }
    }

    #[test]
    fn direct_belt_is_oriented_both_ends() {
        let machines = vec![miner("m"), producer("p")];
        let conduits = vec![belt("b")];
        let connections = vec![
            RawConnection("m.Output0".into(), "b.in".into()),
            RawConnection("b.out".into(), "p.Input0".into()),
        ];
        let recipes = RecipeDatabase::new();
        let mut diag = Diagnostics::default();
        let (mut graph, ports) = build_graph(&machines, &conduits, &recipes, &mut diag);
        resolve_direction(&mut graph, &ports, &connections, &mut diag);

        let c = graph.conduits.values().next().unwrap();
        assert!(c.is_oriented());
        assert_eq!(diag.unoriented_conduits, 0);
    }

    #[test]
    fn pipe_through_pump_resolves_both_pipes() {
        // refinery --PipeOutputFactory--> pipe1 --Connection0/1--> pump --Connection0/1--> pipe2 --PipeInputFactory--> blender
        let refinery = RawMachine {
            id: "ref".into(),
            class_name: "Build_OilRefinery_C".into(),
            position: (0.0, 0.0, 0.0),
            ports: vec![RawPort { port_id: "ref.out".into(), component_name: "PipeOutputFactory".into() }],
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
        };
        let blender = RawMachine {
            id: "bl".into(),
            class_name: "Build_Blender_C".into(),
            position: (0.0, 0.0, 0.0),
            ports: vec![RawPort { port_id: "bl.in".into(), component_name: "PipeInputFactory".into() }],
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
        };
        let pump = RawMachine {
            id: "pump".into(),
            class_name: "Build_PipelinePump_C".into(),
            position: (0.0, 0.0, 0.0),
            ports: vec![
                RawPort { port_id: "pump.c0".into(), component_name: "Connection0".into() },
                RawPort { port_id: "pump.c1".into(), component_name: "Connection1".into() },
            ],
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
        };
        let pipe1 = RawConduit {
            id: "pipe1".into(),
            class_name: "Build_Pipeline_C".into(),
            ports: vec![
                RawPort { port_id: "pipe1.c0".into(), component_name: "PipelineConnection0".into() },
                RawPort { port_id: "pipe1.c1".into(), component_name: "PipelineConnection1".into() },
            ],
        };
        let pipe2 = RawConduit {
            id: "pipe2".into(),
            class_name: "Build_Pipeline_C".into(),
            ports: vec![
                RawPort { port_id: "pipe2.c0".into(), component_name: "PipelineConnection0".into() },
                RawPort { port_id: "pipe2.c1".into(), component_name: "PipelineConnection1".into() },
            ],
        };

        let machines = vec![refinery, blender, pump];
        let conduits = vec![pipe1, pipe2];
        let connections = vec![
            RawConnection("ref.out".into(), "pipe1.c0".into()),
            RawConnection("pipe1.c1".into(), "pump.c0".into()),
            RawConnection("pump.c1".into(), "pipe2.c0".into()),
            RawConnection("pipe2.c1".into(), "bl.in".into()),
        ];

        let recipes = RecipeDatabase::new();
        let mut diag = Diagnostics::default();
        let (mut graph, ports) = build_graph(&machines, &conduits, &recipes, &mut diag);
        resolve_direction(&mut graph, &ports, &connections, &mut diag);

        assert_eq!(diag.unoriented_conduits, 0, "both pipes should resolve through the pump");
        for c in graph.conduits.values() {
            assert!(c.is_oriented());
        }
    }

    #[test]
    fn belt_chain_through_lift_propagates_src_and_dst() {
        let machines = vec![miner("m"), producer("p")];
        let belt_a = belt("a");
        let belt_b = belt("b");
        let conduits = vec![belt_a, belt_b];
        let connections = vec![
            RawConnection("m.Output0".into(), "a.in".into()),
            RawConnection("a.out".into(), "b.in".into()),
            RawConnection("b.out".into(), "p.Input0".into()),
        ];
        let recipes = RecipeDatabase::new();
        let mut diag = Diagnostics::default();
        let (mut graph, ports) = build_graph(&machines, &conduits, &recipes, &mut diag);
        resolve_direction(&mut graph, &ports, &connections, &mut diag);

        assert_eq!(diag.unoriented_conduits, 0);
    }
}
