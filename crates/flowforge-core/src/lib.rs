//! Supply-chain analysis for factory-automation saves: build a production
//! graph from a parsed save, orient its belts and pipes, propagate flow
//! through it (including cyclic sub-graphs), detect a fixed set of issues,
//! trace each one back to a dominator-backed root cause, and — on demand —
//! partition it into districts and manifold blocks with a per-node ledger.
//!
//! The pipeline runs in the stage order spec.md §2 lays out: C1 builds the
//! graph, C2 orients it, C3 propagates flow (leaning on C4's SCC/dominator
//! algorithms), C5 detects issues, C6 traces root causes (leaning on C4
//! again), and C7 (districts, manifold blocks, ledger) runs only when a
//! caller actually asks for it.

pub mod algo;
pub mod builder;
pub mod catalog;
pub mod diagnostics;
pub mod direction;
pub mod error;
#[cfg(feature = "data-loader")]
pub mod ingest;
pub mod flow;
pub mod graph;
pub mod id;
pub mod issues;
pub mod ledger;
pub mod partition;
pub mod recipe;
pub mod rootcause;
pub mod ticket;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, info_span};

use builder::{build_graph, RawConduit, RawConnection, RawMachine};
use diagnostics::Diagnostics;
use direction::resolve_direction;
use error::AnalysisError;
use flow::propagate_flow;
use graph::ProductionGraph;
use id::MachineId;
use issues::{detect_issues, Issue};
use ledger::{compute_ledger, Ledger};
use partition::{compute_manifold_blocks, detect_districts, District, ManifoldBlock};
use recipe::RecipeDatabase;
use rootcause::trace_root_causes;

/// An immutable analysis result: one completed parse -> build -> orient ->
/// propagate -> detect -> trace run (spec.md §5 "one graph build and
/// analysis is atomic"). Districts, manifold blocks, and ledgers are
/// computed lazily from this snapshot, never eagerly, since C7 is
/// optional/on-demand.
#[derive(Debug)]
pub struct AnalysisSnapshot {
    pub graph: ProductionGraph,
    pub diagnostics: Diagnostics,
    pub issues: Vec<Issue>,
}

/// Run the core pipeline (C1 through C6) over already-parsed catalogs.
pub fn analyze(
    machines: &[RawMachine],
    conduits: &[RawConduit],
    connections: &[RawConnection],
    recipes: &RecipeDatabase,
) -> AnalysisSnapshot {
    let mut diagnostics = Diagnostics::default();

    let (mut graph, ports) = info_span!("build_graph").in_scope(|| {
        build_graph(machines, conduits, recipes, &mut diagnostics)
    });

    info_span!("resolve_direction")
        .in_scope(|| resolve_direction(&mut graph, &ports, connections, &mut diagnostics));

    info_span!("propagate_flow").in_scope(|| propagate_flow(&mut graph, &mut diagnostics));

    let mut issues = info_span!("detect_issues").in_scope(|| detect_issues(&graph));

    info_span!("trace_root_causes").in_scope(|| trace_root_causes(&graph, &mut issues));

    info!(
        machines = graph.machines.len(),
        conduits = graph.conduits.len(),
        issues = issues.len(),
        "analysis complete"
    );

    AnalysisSnapshot { graph, diagnostics, issues }
}

/// Decode a save's machine/conduit/connection catalogs and its recipe
/// database from JSON, then run [`analyze`]. The only error path in this
/// crate (spec.md §7): everything downstream of a successful parse degrades
/// gracefully into `diagnostics` instead of failing.
#[cfg(feature = "data-loader")]
pub fn analyze_from_json(factory_json: &str, recipe_json: &str) -> Result<AnalysisSnapshot, AnalysisError> {
    let (machines, conduits, connections) = ingest::load_factory_json(factory_json)?;
    let recipes = recipe::data_loader::load_recipe_database_json(recipe_json)?;
    Ok(analyze(&machines, &conduits, &connections, &recipes))
}

impl AnalysisSnapshot {
    /// How many issues name each machine, for [`partition::District::issue_count`].
    fn issue_counts(&self) -> BTreeMap<MachineId, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.machine_id).or_insert(0) += 1;
        }
        counts
    }

    /// C7, on demand: districts plus their node membership.
    pub fn districts(&self) -> (Vec<District>, BTreeMap<MachineId, usize>) {
        detect_districts(&self.graph, &self.issue_counts())
    }

    /// C7, on demand: manifold blocks plus their node membership.
    pub fn manifold_blocks(&self) -> (Vec<ManifoldBlock>, BTreeMap<MachineId, String>) {
        compute_manifold_blocks(&self.graph)
    }

    /// C7, on demand: the item balance sheet over an arbitrary node set (a
    /// district or an ad-hoc lasso selection).
    pub fn ledger(&self, members: &BTreeSet<MachineId>) -> Ledger {
        compute_ledger(&self.graph, members)
    }

    /// Compute one ledger per district, in district order. Under the
    /// `parallel` feature this fans out across `rayon`'s global pool since
    /// each district's ledger is independent of every other's; the
    /// sequential fallback keeps the same output.
    #[cfg(feature = "parallel")]
    pub fn district_ledgers(&self, districts: &[District]) -> Vec<Ledger> {
        use rayon::prelude::*;
        districts
            .par_iter()
            .map(|d| {
                let members: BTreeSet<MachineId> = d.members.iter().copied().collect();
                compute_ledger(&self.graph, &members)
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    pub fn district_ledgers(&self, districts: &[District]) -> Vec<Ledger> {
        districts
            .iter()
            .map(|d| {
                let members: BTreeSet<MachineId> = d.members.iter().copied().collect();
                compute_ledger(&self.graph, &members)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 boundary scenario 1: empty graph, no exception, empty
    /// output.
    #[test]
    fn empty_graph_analyzes_cleanly() {
        let recipes = RecipeDatabase::new();
        let snapshot = analyze(&[], &[], &[], &recipes);
        assert_eq!(snapshot.graph.machines.len(), 0);
        assert_eq!(snapshot.issues.len(), 0);
        let (districts, _) = snapshot.districts();
        assert!(districts.is_empty());
    }
}
