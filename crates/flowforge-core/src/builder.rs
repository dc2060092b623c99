//! C1 — Graph Builder: attach recipe rates to machines and build the
//! node/edge arena from the parsed catalogs (spec.md §4.1).
//!
//! C1 does not resolve conduit direction — every conduit starts with
//! `src = dst = None`; that is C2's job (see [`crate::direction`]). C1's
//! output additionally includes a [`PortIndex`] mapping every raw port id to
//! the machine or conduit that owns it and to its [`crate::direction::PortClass`],
//! which C2 consumes directly.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::catalog::{self, MachineClassEntry};
use crate::direction::{classify_port, PortClass};
use crate::diagnostics::Diagnostics;
use crate::graph::{Conduit, Machine, MachineCategory, ProductionGraph};
use crate::id::{ConduitId, MachineId};
use crate::recipe::{match_recipe_slug, RecipeDatabase};

/// A machine-side or conduit-side port as handed in by the external save
/// decoder: a stable id and its raw component name (used for classification,
/// e.g. `Output0`, `ConveyorAny1`).
#[derive(Debug, Clone)]
pub struct RawPort {
    pub port_id: String,
    pub component_name: String,
}

/// One machine from the parsed catalog (spec.md §6 input 1).
#[derive(Debug, Clone)]
pub struct RawMachine {
    pub id: String,
    pub class_name: String,
    pub position: (f64, f64, f64),
    pub ports: Vec<RawPort>,
    pub recipe_slug: Option<String>,
    pub clock: f64,
    pub producing: bool,
    pub productivity: f64,
}

/// One conduit from the parsed catalog (spec.md §6 input 2).
#[derive(Debug, Clone)]
pub struct RawConduit {
    pub id: String,
    pub class_name: String,
    pub ports: Vec<RawPort>,
}

/// An unordered port-to-port wiring connection (spec.md §6 input 3).
#[derive(Debug, Clone)]
pub struct RawConnection(pub String, pub String);

/// Which graph entity a port belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOwner {
    Machine(MachineId),
    Conduit(ConduitId),
}

/// Maps every raw port id to its owning entity and classified direction,
/// produced by C1 and consumed by C2.
#[derive(Debug, Default)]
pub struct PortIndex {
    pub owner: BTreeMap<String, PortOwner>,
    pub class: BTreeMap<String, PortClass>,
}

fn lookup_machine_class(class_name: &str) -> Option<&'static MachineClassEntry> {
    catalog::MACHINE_CLASSES
        .iter()
        .find(|e| e.class_name == class_name)
}

fn lookup_conduit_class(class_name: &str) -> Option<&'static catalog::ConduitClassEntry> {
    catalog::CONDUIT_CLASSES
        .iter()
        .find(|e| e.class_name == class_name)
}

/// Build the production graph from the raw catalogs, binding recipes along
/// the way. Unknown machine/conduit classes are skipped (mirrors the
/// original's "skip non-factory objects" fallthrough) and counted in
/// `diagnostics`.
pub fn build_graph(
    machines_in: &[RawMachine],
    conduits_in: &[RawConduit],
    recipes: &RecipeDatabase,
    diagnostics: &mut Diagnostics,
) -> (ProductionGraph, PortIndex) {
    let mut graph = ProductionGraph::new();
    let mut ports = PortIndex::default();

    for raw in machines_in {
        let Some(class) = lookup_machine_class(&raw.class_name) else {
            diagnostics.unknown_machine_classes += 1;
            continue;
        };

        let (recipe, expected_inputs, expected_outputs) =
            bind_recipe(raw, class, recipes, diagnostics);

        let machine_id = graph.add_machine(Machine {
            external_id: raw.id.clone(),
            class_name: raw.class_name.clone(),
            display_name: class.display_name.to_string(),
            category: class.category,
            recipe,
            recipe_slug: raw.recipe_slug.clone(),
            clock: raw.clock,
            producing: raw.producing,
            productivity: raw.productivity,
            position: raw.position,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            expected_inputs,
            expected_outputs,
            available_input: 0.0,
            available_output: 0.0,
        });

        for port in &raw.ports {
            ports.owner.insert(port.port_id.clone(), PortOwner::Machine(machine_id));
            if let Some(class) = classify_port(&port.component_name) {
                ports.class.insert(port.port_id.clone(), class);
            }
        }
    }

    for raw in conduits_in {
        let Some(class) = lookup_conduit_class(&raw.class_name) else {
            diagnostics.unknown_conduit_classes += 1;
            continue;
        };

        let conduit_id = graph.add_conduit(Conduit {
            external_id: raw.id.clone(),
            class_name: raw.class_name.clone(),
            display_name: class.display_name.to_string(),
            max_rate: class.max_rate,
            is_pipe: class.is_pipe,
            src: None,
            dst: None,
            flow_rate: 0.0,
        });

        for port in &raw.ports {
            ports.owner.insert(port.port_id.clone(), PortOwner::Conduit(conduit_id));
            if let Some(class) = classify_port(&port.component_name) {
                ports.class.insert(port.port_id.clone(), class);
            }
        }
    }

    debug!(
        machines = graph.machines.len(),
        conduits = graph.conduits.len(),
        unmatched_recipes = diagnostics.unmatched_recipe_slugs.len(),
        "C1 graph built"
    );

    (graph, ports)
}

/// Recipe binding for one machine, per spec.md §4.1 "Recipe binding" and
/// "Expected-rate population".
fn bind_recipe(
    raw: &RawMachine,
    class: &MachineClassEntry,
    recipes: &RecipeDatabase,
    diagnostics: &mut Diagnostics,
) -> (
    Option<crate::id::RecipeId>,
    BTreeMap<crate::id::ItemId, f64>,
    BTreeMap<crate::id::ItemId, f64>,
) {
    let mut expected_inputs = BTreeMap::new();
    let mut expected_outputs = BTreeMap::new();

    let Some(slug) = raw.recipe_slug.as_deref() else {
        if class.category == MachineCategory::Miner {
            let base_rate = catalog::miner_base_rate(class.display_name);
            if base_rate > 0.0 {
                let item = recipes.items.lookup(catalog::MINED_ITEM_PLACEHOLDER);
                if let Some(item) = item {
                    expected_outputs.insert(item, base_rate * raw.clock);
                }
            }
        }
        return (None, expected_inputs, expected_outputs);
    };

    let recipe_name = match_recipe_slug(slug, recipes);
    let recipe_id = recipe_name.as_deref().and_then(|n| recipes.id_by_name(n));

    match recipe_id {
        Some(id) => {
            let recipe = recipes.get(id);
            for entry in &recipe.inputs {
                *expected_inputs.entry(entry.item).or_insert(0.0) += entry.rate_per_min * raw.clock;
            }
            for entry in &recipe.outputs {
                *expected_outputs.entry(entry.item).or_insert(0.0) += entry.rate_per_min * raw.clock;
            }
            trace!(machine = %raw.id, recipe = %recipe.name, "recipe bound");
            (Some(id), expected_inputs, expected_outputs)
        }
        None => {
            diagnostics.unmatched_recipe_slugs.insert(slug.to_string());
            if class.category == MachineCategory::Miner {
                let base_rate = catalog::miner_base_rate(class.display_name);
                if base_rate > 0.0 {
                    if let Some(item) = recipes.items.lookup(catalog::MINED_ITEM_PLACEHOLDER) {
                        expected_outputs.insert(item, base_rate * raw.clock);
                    }
                }
            }
            (None, expected_inputs, expected_outputs)
        }
    }
}
