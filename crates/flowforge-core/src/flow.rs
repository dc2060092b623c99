//! C3 — Flow Propagator: seed miner output, decompose the graph into SCCs
//! (via C4), walk the condensation in topological order, and run a damped
//! fixed point inside any multi-node SCC (spec.md §4.3). Grounded directly
//! on the original implementation's `propagate_flow` /
//! `_calculate_node_flow` / `_fixed_point_scc` (`graph_analyzer.py`).

use tracing::debug;

use crate::algo::{condensation_topo_order, tarjan_scc};
use crate::catalog::LogisticKind;
use crate::diagnostics::Diagnostics;
use crate::graph::{MachineCategory, ProductionGraph};
use crate::id::{ConduitId, MachineId};

const SCC_DAMPING: f64 = 0.7;
const SCC_EPSILON: f64 = 0.01;
const SCC_MAX_ITER: usize = 100;

/// Run flow propagation over the whole graph; mutates every machine's
/// `available_input`/`available_output` and every oriented conduit's
/// `flow_rate` in place.
pub fn propagate_flow(graph: &mut ProductionGraph, diagnostics: &mut Diagnostics) {
    initialize_miners(graph);

    let adj = graph.forward_adjacency();
    let decomp = tarjan_scc(&adj);
    let order = condensation_topo_order(&decomp, &adj);

    for scc_idx in order {
        let members = decomp.sccs[scc_idx].clone();
        if members.len() == 1 {
            evaluate_singleton(graph, members[0]);
        } else if !damped_fixed_point(graph, &members) {
            diagnostics.unconverged_sccs += 1;
        }
    }

    debug!(sccs = decomp.sccs.len(), "C3 flow propagated");
}

/// Seed every miner's `available_output` at `tier_rate × clock` (already
/// folded into its expected-output entry by C1) and split it evenly over
/// its outgoing conduits (spec.md §4.3 "Initialization").
fn initialize_miners(graph: &mut ProductionGraph) {
    let miners: Vec<MachineId> = graph
        .machines
        .iter()
        .filter(|(_, m)| m.category == MachineCategory::Miner)
        .map(|(id, _)| id)
        .collect();

    for id in miners {
        let (rate, outgoing) = {
            let m = graph.machine(id).unwrap();
            (m.total_expected_output(), m.outgoing.clone())
        };
        graph.machine_mut(id).unwrap().available_output = rate;
        distribute_even(graph, &outgoing, rate);
    }
}

/// Compute (without applying) a node's available_input and the
/// available_output its category rule prescribes (spec.md §4.3 "Singleton
/// SCC"); shared by the singleton and cyclic evaluation paths.
fn evaluate_node(graph: &ProductionGraph, id: MachineId) -> (f64, f64) {
    let m = graph.machine(id).unwrap();
    let available_input: f64 = m
        .incoming
        .iter()
        .filter_map(|c| graph.conduit(*c))
        .map(|c| c.flow_rate)
        .sum();

    let available_output = match m.category {
        MachineCategory::Miner => m.total_expected_output(),
        MachineCategory::Logistics(_) => available_input,
        MachineCategory::Producer | MachineCategory::Generator if m.has_recipe() => {
            let expected_input = m.total_expected_input();
            let sufficiency = if expected_input > 0.0 {
                (available_input / expected_input).min(1.0)
            } else {
                1.0
            };
            m.total_expected_output() * sufficiency
        }
        // Storage, transport, and producers/generators without a recipe all
        // pass available_input straight through.
        _ => available_input,
    };

    (available_input, available_output)
}

fn logistic_kind_of(category: MachineCategory) -> Option<LogisticKind> {
    match category {
        MachineCategory::Logistics(kind) => Some(kind),
        _ => None,
    }
}

/// Redistribute `available_output` over a node's outgoing conduits by its
/// category's sub-rule: mergers and pumps give every outgoing conduit
/// `min(available_output, max_rate)`; everything else (splitters, pipe
/// junctions, producers, storage, transport) splits evenly, each capped.
fn redistribute(graph: &mut ProductionGraph, id: MachineId, available_output: f64) {
    let (kind, outgoing) = {
        let m = graph.machine(id).unwrap();
        (logistic_kind_of(m.category), m.outgoing.clone())
    };
    match kind {
        Some(LogisticKind::Merger) | Some(LogisticKind::PipelinePump) => {
            distribute_capped_each(graph, &outgoing, available_output);
        }
        _ => distribute_even(graph, &outgoing, available_output),
    }
}

fn distribute_even(graph: &mut ProductionGraph, outgoing: &[ConduitId], total: f64) {
    if outgoing.is_empty() {
        return;
    }
    let share = total / outgoing.len() as f64;
    for &c in outgoing {
        if let Some(conduit) = graph.conduit_mut(c) {
            conduit.flow_rate = share.clamp(0.0, conduit.max_rate);
        }
    }
}

fn distribute_capped_each(graph: &mut ProductionGraph, outgoing: &[ConduitId], value: f64) {
    for &c in outgoing {
        if let Some(conduit) = graph.conduit_mut(c) {
            conduit.flow_rate = value.clamp(0.0, conduit.max_rate);
        }
    }
}

fn evaluate_singleton(graph: &mut ProductionGraph, id: MachineId) {
    let (available_input, available_output) = evaluate_node(graph, id);
    {
        let m = graph.machine_mut(id).unwrap();
        m.available_input = available_input;
        m.available_output = available_output;
    }
    redistribute(graph, id, available_output);
}

/// Damped fixed point over a multi-node SCC (spec.md §4.3 "Multi-node SCC
/// (cycle)"). Each sweep re-evaluates every member in the same fixed order,
/// sequentially (a member's own update this sweep is visible to the next
/// member evaluated within it), blends with `α = 0.7`, and rewrites outgoing
/// flow from the blended value. Returns whether it converged within
/// [`SCC_MAX_ITER`] sweeps.
fn damped_fixed_point(graph: &mut ProductionGraph, members: &[MachineId]) -> bool {
    for _ in 0..SCC_MAX_ITER {
        let mut max_delta = 0.0f64;
        for &id in members {
            let (input, output) = evaluate_node(graph, id);
            let old_output = graph.machine(id).unwrap().available_output;
            let blended = SCC_DAMPING * output + (1.0 - SCC_DAMPING) * old_output;
            max_delta = max_delta.max((blended - old_output).abs());

            {
                let m = graph.machine_mut(id).unwrap();
                m.available_input = input;
                m.available_output = blended;
            }
            redistribute(graph, id, blended);
        }
        if max_delta < SCC_EPSILON {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Conduit, Machine};
    use crate::id::ItemId;

    fn machine(category: MachineCategory) -> Machine {
        Machine {
            external_id: "m".into(),
            class_name: "Build_Test_C".into(),
            display_name: "Test".into(),
            category,
            recipe: None,
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
            position: (0.0, 0.0, 0.0),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            expected_inputs: Default::default(),
            expected_outputs: Default::default(),
            available_input: 0.0,
            available_output: 0.0,
        }
    }

    fn belt(src: MachineId, dst: MachineId, max_rate: f64) -> Conduit {
        Conduit {
            external_id: "c".into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            display_name: "Belt Mk.1".into(),
            max_rate,
            is_pipe: false,
            src: Some(src),
            dst: Some(dst),
            flow_rate: 0.0,
        }
    }

    #[test]
    fn miner_into_capped_belt_into_producer() {
        let mut graph = ProductionGraph::new();
        let item = ItemId(0);

        let mut miner = machine(MachineCategory::Miner);
        miner.expected_outputs.insert(item, 240.0); // tier 240/min at clock 1.0
        let miner_id = graph.add_machine(miner);

        let mut producer = machine(MachineCategory::Producer);
        producer.recipe = Some(crate::id::RecipeId(0));
        producer.expected_inputs.insert(item, 30.0);
        let producer_id = graph.add_machine(producer);

        let conduit_id = graph.add_conduit(belt(miner_id, producer_id, 60.0));
        graph.register_orientation(conduit_id);

        let mut diag = Diagnostics::default();
        propagate_flow(&mut graph, &mut diag);

        assert_eq!(graph.conduit(conduit_id).unwrap().flow_rate, 60.0);
        assert_eq!(graph.machine(producer_id).unwrap().available_input, 60.0);
        assert_eq!(graph.machine(producer_id).unwrap().sufficiency(), 1.0);
        assert_eq!(diag.unconverged_sccs, 0);
    }

    #[test]
    fn self_consuming_cycle_converges() {
        let mut graph = ProductionGraph::new();
        let item_a = ItemId(0);
        let item_b = ItemId(1);

        let mut miner = machine(MachineCategory::Miner);
        miner.expected_outputs.insert(item_a, 120.0);
        let miner_id = graph.add_machine(miner);

        let mut a = machine(MachineCategory::Producer);
        a.recipe = Some(crate::id::RecipeId(0));
        a.expected_inputs.insert(item_a, 60.0);
        a.expected_inputs.insert(item_b, 10.0);
        a.expected_outputs.insert(item_a, 50.0);
        let a_id = graph.add_machine(a);

        let mut b = machine(MachineCategory::Producer);
        b.recipe = Some(crate::id::RecipeId(1));
        b.expected_inputs.insert(item_a, 50.0);
        b.expected_outputs.insert(item_b, 10.0);
        let b_id = graph.add_machine(b);

        let c1 = graph.add_conduit(belt(miner_id, a_id, 300.0));
        let c2 = graph.add_conduit(belt(a_id, b_id, 300.0));
        let c3 = graph.add_conduit(belt(b_id, a_id, 300.0));
        for c in [c1, c2, c3] {
            graph.register_orientation(c);
        }

        let mut diag = Diagnostics::default();
        propagate_flow(&mut graph, &mut diag);

        assert_eq!(diag.unconverged_sccs, 0);
        for conduit in graph.conduits.values() {
            assert!(conduit.flow_rate >= 0.0 && conduit.flow_rate <= conduit.max_rate);
        }
    }

    #[test]
    fn splitter_splits_evenly_and_caps() {
        let mut graph = ProductionGraph::new();
        let mut miner = machine(MachineCategory::Miner);
        miner.expected_outputs.insert(ItemId(0), 120.0);
        let miner_id = graph.add_machine(miner);
        let splitter_id = graph.add_machine(machine(MachineCategory::Logistics(LogisticKind::Splitter)));
        let out_a = graph.add_machine(machine(MachineCategory::Storage));
        let out_b = graph.add_machine(machine(MachineCategory::Storage));

        let feed = graph.add_conduit(belt(miner_id, splitter_id, 300.0));
        let leg_a = graph.add_conduit(belt(splitter_id, out_a, 40.0));
        let leg_b = graph.add_conduit(belt(splitter_id, out_b, 300.0));
        for c in [feed, leg_a, leg_b] {
            graph.register_orientation(c);
        }

        let mut diag = Diagnostics::default();
        propagate_flow(&mut graph, &mut diag);

        assert_eq!(graph.conduit(leg_a).unwrap().flow_rate, 40.0); // capped
        assert_eq!(graph.conduit(leg_b).unwrap().flow_rate, 60.0); // even half, uncapped
    }
}
