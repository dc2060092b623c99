//! C7 — Ledger: a per-item balance sheet over an arbitrary node set (a
//! district or an ad-hoc lasso selection), spec.md §4.7 "Ledger". Grounded
//! directly on the original implementation's `compute_ledger`
//! (`district_analyzer.py`).

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{MachineCategory, ProductionGraph};
use crate::id::{ConduitId, ItemId, MachineId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ItemStatus {
    Surplus,
    Deficit,
    Imported,
    Balanced,
    Unused,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LedgerLine {
    pub item: ItemId,
    pub produced: f64,
    pub consumed: f64,
    pub net: f64,
    pub external_in: f64,
    pub external_out: f64,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BoundaryConduit {
    pub conduit_id: ConduitId,
    pub src: MachineId,
    pub dst: MachineId,
    pub flow_rate: f64,
    pub max_rate: f64,
    pub utilization: f64,
    pub is_pipe: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LedgerTotals {
    pub machines: usize,
    pub producing: usize,
    pub boundary_in_count: usize,
    pub boundary_out_count: usize,
    pub total_external_in_rate: f64,
    pub total_external_out_rate: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Ledger {
    pub lines: Vec<LedgerLine>,
    pub totals: LedgerTotals,
    pub tightest_boundary: Option<BoundaryConduit>,
}

const DEFICIT_THRESHOLD: f64 = -0.5;
const SURPLUS_THRESHOLD: f64 = 0.5;

/// Compute the balance sheet for `members`: sums expected input over
/// producer/generator members into `consumed`, expected output over
/// producer/generator/miner members into `produced`, and attributes
/// boundary-conduit flow (exactly one endpoint in `members`) into
/// `external_in`/`external_out` by the outside node's expected item list,
/// split equally when that list names more than one item.
pub fn compute_ledger(graph: &ProductionGraph, members: &BTreeSet<MachineId>) -> Ledger {
    let mut produced: BTreeMap<ItemId, f64> = BTreeMap::new();
    let mut consumed: BTreeMap<ItemId, f64> = BTreeMap::new();
    let mut external_in: BTreeMap<ItemId, f64> = BTreeMap::new();
    let mut external_out: BTreeMap<ItemId, f64> = BTreeMap::new();

    let mut machines = 0usize;
    let mut producing = 0usize;

    for &id in members {
        let Some(m) = graph.machine(id) else { continue };
        match m.category {
            MachineCategory::Producer | MachineCategory::Generator if m.has_recipe() => {
                machines += 1;
                if m.producing {
                    producing += 1;
                }
                for (&item, &rate) in &m.expected_outputs {
                    *produced.entry(item).or_insert(0.0) += rate;
                }
                for (&item, &rate) in &m.expected_inputs {
                    *consumed.entry(item).or_insert(0.0) += rate;
                }
            }
            MachineCategory::Miner => {
                machines += 1;
                if m.producing || m.available_output > 0.0 {
                    producing += 1;
                }
                for (&item, &rate) in &m.expected_outputs {
                    *produced.entry(item).or_insert(0.0) += rate;
                }
            }
            _ => {}
        }
    }

    let mut boundary_in = Vec::new();
    let mut boundary_out = Vec::new();

    for (conduit_id, conduit) in graph.conduits.iter() {
        let (Some(src), Some(dst)) = (conduit.src, conduit.dst) else { continue };
        let src_inside = members.contains(&src);
        let dst_inside = members.contains(&dst);
        if src_inside && !dst_inside {
            boundary_out.push((conduit_id, conduit, src, dst));
        } else if !src_inside && dst_inside {
            boundary_in.push((conduit_id, conduit, src, dst));
        }
    }

    for &(_, conduit, src, _) in &boundary_in {
        if let Some(src_m) = graph.machine(src) {
            if !src_m.expected_outputs.is_empty() {
                let share = conduit.flow_rate / src_m.expected_outputs.len() as f64;
                for &item in src_m.expected_outputs.keys() {
                    *external_in.entry(item).or_insert(0.0) += share;
                }
            }
        }
    }

    for &(_, conduit, _, dst) in &boundary_out {
        if let Some(dst_m) = graph.machine(dst) {
            if !dst_m.expected_inputs.is_empty() {
                let share = conduit.flow_rate / dst_m.expected_inputs.len() as f64;
                for &item in dst_m.expected_inputs.keys() {
                    *external_out.entry(item).or_insert(0.0) += share;
                }
            }
        }
    }

    let all_items: BTreeSet<ItemId> = produced.keys().chain(consumed.keys()).copied().collect();
    let mut lines: Vec<LedgerLine> = all_items
        .into_iter()
        .map(|item| {
            let p = produced.get(&item).copied().unwrap_or(0.0);
            let c = consumed.get(&item).copied().unwrap_or(0.0);
            let net = p - c;
            let status = if p == 0.0 && c == 0.0 {
                ItemStatus::Unused
            } else if c == 0.0 {
                ItemStatus::Surplus
            } else if p == 0.0 {
                ItemStatus::Imported
            } else if net > SURPLUS_THRESHOLD {
                ItemStatus::Surplus
            } else if net < DEFICIT_THRESHOLD {
                ItemStatus::Deficit
            } else {
                ItemStatus::Balanced
            };
            LedgerLine {
                item,
                produced: p,
                consumed: c,
                net,
                external_in: external_in.get(&item).copied().unwrap_or(0.0),
                external_out: external_out.get(&item).copied().unwrap_or(0.0),
                status,
            }
        })
        .collect();

    lines.sort_by(|a, b| status_rank(a.status).cmp(&status_rank(b.status)).then(
        b.net.abs().partial_cmp(&a.net.abs()).unwrap_or(std::cmp::Ordering::Equal),
    ));

    let tightest_boundary = boundary_in
        .iter()
        .chain(boundary_out.iter())
        .filter(|(_, c, _, _)| c.max_rate > 0.0)
        .max_by(|(_, a, _, _), (_, b, _, _)| {
            (a.flow_rate / a.max_rate).partial_cmp(&(b.flow_rate / b.max_rate)).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|&(conduit_id, c, src, dst)| BoundaryConduit {
            conduit_id,
            src,
            dst,
            flow_rate: c.flow_rate,
            max_rate: c.max_rate,
            utilization: c.flow_rate / c.max_rate,
            is_pipe: c.is_pipe,
        });

    Ledger {
        lines,
        totals: LedgerTotals {
            machines,
            producing,
            boundary_in_count: boundary_in.len(),
            boundary_out_count: boundary_out.len(),
            total_external_in_rate: boundary_in.iter().map(|(_, c, _, _)| c.flow_rate).sum(),
            total_external_out_rate: boundary_out.iter().map(|(_, c, _, _)| c.flow_rate).sum(),
        },
        tightest_boundary,
    }
}

fn status_rank(status: ItemStatus) -> u8 {
    match status {
        ItemStatus::Deficit => 0,
        ItemStatus::Imported => 1,
        ItemStatus::Surplus => 2,
        ItemStatus::Balanced => 3,
        ItemStatus::Unused => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Conduit, Machine};

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

    #[test]
    fn deficit_item_is_flagged_and_sorted_first() {
        let mut graph = ProductionGraph::new();
        let item = ItemId(0);

        let mut producer = machine(MachineCategory::Producer);
        producer.recipe = Some(crate::id::RecipeId(0));
        producer.expected_inputs.insert(item, 100.0);
        let producer_id = graph.add_machine(producer);

        let mut balanced = machine(MachineCategory::Producer);
        balanced.recipe = Some(crate::id::RecipeId(1));
        let other_item = ItemId(1);
        balanced.expected_outputs.insert(other_item, 10.0);
        balanced.expected_inputs.insert(other_item, 10.0);
        let balanced_id = graph.add_machine(balanced);

        let members: BTreeSet<MachineId> = [producer_id, balanced_id].into_iter().collect();
        let ledger = compute_ledger(&graph, &members);

        assert_eq!(ledger.lines[0].item, item);
        assert_eq!(ledger.lines[0].status, ItemStatus::Deficit);
        assert_eq!(ledger.totals.machines, 2);
    }

    #[test]
    fn boundary_conduit_attributes_external_flow() {
        let mut graph = ProductionGraph::new();
        let item = ItemId(0);

        let outside_miner = machine(MachineCategory::Miner);
        let outside_id = graph.add_machine(outside_miner);

        let mut inside = machine(MachineCategory::Producer);
        inside.recipe = Some(crate::id::RecipeId(0));
        inside.expected_inputs.insert(item, 60.0);
        let inside_id = graph.add_machine(inside);

        graph.machine_mut(outside_id).unwrap().expected_outputs.insert(item, 60.0);

        let conduit_id = graph.add_conduit(Conduit {
            external_id: "c".into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            display_name: "Belt Mk.1".into(),
            max_rate: 60.0,
            is_pipe: false,
            src: Some(outside_id),
            dst: Some(inside_id),
            flow_rate: 60.0,
        });
        graph.register_orientation(conduit_id);

        let members: BTreeSet<MachineId> = [inside_id].into_iter().collect();
        let ledger = compute_ledger(&graph, &members);

        assert_eq!(ledger.totals.boundary_in_count, 1);
        assert_eq!(ledger.lines[0].external_in, 60.0);
        assert!(ledger.tightest_boundary.is_some());
    }
}
