//! The production graph arena: [`Machine`] and [`Conduit`] nodes/edges keyed
//! by stable [`MachineId`]/[`ConduitId`] [`slotmap`] keys.
//!
//! Unlike a live simulation's arena, this one is built in a single pass by
//! C1 and mutated in two further bounded passes (C2 fills `src`/`dst` and
//! the incoming/outgoing lists, C3 fills the flow fields) — there is no
//! queued-mutation/remove machinery here, because nothing is ever removed
//! or re-added once this snapshot exists (spec.md §3 "Lifecycles").

use std::collections::BTreeMap;

use slotmap::SlotMap;

use crate::catalog::LogisticKind;
use crate::id::{ConduitId, ItemId, MachineId, RecipeId};

/// The category a machine belongs to, matching the save's building taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MachineCategory {
    Producer,
    Generator,
    Miner,
    Logistics(LogisticKind),
    Storage,
    Transport,
}

impl MachineCategory {
    pub fn is_sink_category(self) -> bool {
        matches!(self, MachineCategory::Storage)
    }
}

/// A machine (node) in the production graph.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Machine {
    /// The stable string id from the external save decoder, preserved for
    /// round-tripping with the caller's world (ticket hashes, UI lookups).
    pub external_id: String,
    pub class_name: String,
    pub display_name: String,
    pub category: MachineCategory,
    pub recipe: Option<RecipeId>,
    /// Raw recipe slug as seen in the save, kept even when unmatched.
    pub recipe_slug: Option<String>,
    pub clock: f64,
    pub producing: bool,
    pub productivity: f64,
    pub position: (f64, f64, f64),

    pub incoming: Vec<ConduitId>,
    pub outgoing: Vec<ConduitId>,

    pub expected_inputs: BTreeMap<ItemId, f64>,
    pub expected_outputs: BTreeMap<ItemId, f64>,

    pub available_input: f64,
    pub available_output: f64,
}

impl Machine {
    pub fn total_expected_input(&self) -> f64 {
        self.expected_inputs.values().sum()
    }

    pub fn total_expected_output(&self) -> f64 {
        self.expected_outputs.values().sum()
    }

    /// Ratio of available to expected input, clipped at 1.0 (spec.md §4.3).
    pub fn sufficiency(&self) -> f64 {
        let expected = self.total_expected_input();
        if expected > 0.0 {
            (self.available_input / expected).min(1.0)
        } else {
            1.0
        }
    }

    pub fn has_recipe(&self) -> bool {
        self.recipe.is_some()
    }
}

/// A conduit (edge) in the production graph: a belt or pipe.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Conduit {
    pub external_id: String,
    pub class_name: String,
    pub display_name: String,
    pub max_rate: f64,
    pub is_pipe: bool,

    pub src: Option<MachineId>,
    pub dst: Option<MachineId>,

    pub flow_rate: f64,
}

impl Conduit {
    pub fn is_oriented(&self) -> bool {
        self.src.is_some() && self.dst.is_some()
    }

    pub fn utilization(&self) -> f64 {
        if self.max_rate > 0.0 {
            self.flow_rate / self.max_rate
        } else {
            0.0
        }
    }
}

/// The production graph: an arena of machines and conduits plus the
/// adjacency carried directly on each [`Machine`]'s `incoming`/`outgoing`.
#[derive(Debug, Default)]
pub struct ProductionGraph {
    pub machines: SlotMap<MachineId, Machine>,
    pub conduits: SlotMap<ConduitId, Conduit>,
}

impl ProductionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(&mut self, machine: Machine) -> MachineId {
        self.machines.insert(machine)
    }

    pub fn add_conduit(&mut self, conduit: Conduit) -> ConduitId {
        self.conduits.insert(conduit)
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn machine_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.get_mut(id)
    }

    pub fn conduit(&self, id: ConduitId) -> Option<&Conduit> {
        self.conduits.get(id)
    }

    pub fn conduit_mut(&mut self, id: ConduitId) -> Option<&mut Conduit> {
        self.conduits.get_mut(id)
    }

    /// Register a now-fully-oriented conduit with its endpoints'
    /// incoming/outgoing lists (deduplicated), per spec.md §4.2
    /// "Registration".
    pub fn register_orientation(&mut self, conduit_id: ConduitId) {
        let (src, dst) = match self.conduits.get(conduit_id) {
            Some(c) => (c.src, c.dst),
            None => return,
        };
        if let (Some(src), Some(dst)) = (src, dst) {
            if let Some(m) = self.machines.get_mut(src) {
                if !m.outgoing.contains(&conduit_id) {
                    m.outgoing.push(conduit_id);
                }
            }
            if let Some(m) = self.machines.get_mut(dst) {
                if !m.incoming.contains(&conduit_id) {
                    m.incoming.push(conduit_id);
                }
            }
        }
    }

    /// Forward adjacency over fully-oriented conduits only, collapsed
    /// across parallel conduits (spec.md §4.3 "Decomposition"). A
    /// [`BTreeMap`] rather than a [`SecondaryMap`] so C4's algorithms get a
    /// reproducible iteration order independent of slotmap key internals.
    pub fn forward_adjacency(&self) -> BTreeMap<MachineId, Vec<MachineId>> {
        let mut adj: BTreeMap<MachineId, Vec<MachineId>> = BTreeMap::new();
        for id in self.machines.keys() {
            adj.insert(id, Vec::new());
        }
        for conduit in self.conduits.values() {
            if let (Some(src), Some(dst)) = (conduit.src, conduit.dst) {
                let list = adj.entry(src).or_default();
                if !list.contains(&dst) {
                    list.push(dst);
                }
            }
        }
        adj
    }

    pub fn oriented_conduit_count(&self) -> usize {
        self.conduits.values().filter(|c| c.is_oriented()).count()
    }

    pub fn unoriented_conduit_count(&self) -> usize {
        self.conduits.values().filter(|c| !c.is_oriented()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_machine(name: &str, category: MachineCategory) -> Machine {
        Machine {
            external_id: name.to_string(),
            class_name: "Build_Test_C".into(),
            display_name: name.to_string(),
            category,
            recipe: None,
            recipe_slug: None,
            clock: 1.0,
            producing: true,
            productivity: 1.0,
            position: (0.0, 0.0, 0.0),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            expected_inputs: BTreeMap::new(),
            expected_outputs: BTreeMap::new(),
            available_input: 0.0,
            available_output: 0.0,
        }
    }

    #[test]
    fn register_orientation_dedups() {
        let mut g = ProductionGraph::new();
        let a = g.add_machine(sample_machine("a", MachineCategory::Miner));
        let b = g.add_machine(sample_machine("b", MachineCategory::Producer));
        let c = g.add_conduit(Conduit {
            external_id: "c".into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            display_name: "Belt Mk.1".into(),
            max_rate: 60.0,
            is_pipe: false,
            src: Some(a),
            dst: Some(b),
            flow_rate: 0.0,
        });
        g.register_orientation(c);
        g.register_orientation(c);
        assert_eq!(g.machine(a).unwrap().outgoing, vec![c]);
        assert_eq!(g.machine(b).unwrap().incoming, vec![c]);
    }

    #[test]
    fn forward_adjacency_skips_unoriented() {
        let mut g = ProductionGraph::new();
        let a = g.add_machine(sample_machine("a", MachineCategory::Miner));
        let b = g.add_machine(sample_machine("b", MachineCategory::Producer));
        g.add_conduit(Conduit {
            external_id: "c".into(),
            class_name: "x".into(),
            display_name: "x".into(),
            max_rate: 60.0,
            is_pipe: false,
            src: Some(a),
            dst: None,
            flow_rate: 0.0,
        });
        let adj = g.forward_adjacency();
        assert!(adj.get(&a).unwrap().is_empty());
        assert!(adj.get(&b).unwrap().is_empty());
    }
}
