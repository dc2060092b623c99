//! Non-fatal anomaly counters accumulated across the pipeline (spec.md §7
//! "Propagation policy": the analyzer degrades gracefully and records
//! anomalies rather than aborting).

use std::collections::BTreeSet;

/// Anomaly counters and reports collected across one analysis run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct Diagnostics {
    /// Recipe slugs that matched no database entry by any strategy (§4.1).
    pub unmatched_recipe_slugs: BTreeSet<String>,
    /// Machine classes not present in the static catalog.
    pub unknown_machine_classes: usize,
    /// Conduit classes not present in the static catalog.
    pub unknown_conduit_classes: usize,
    /// Conduits still missing `src` or `dst` after both C2 fixed points.
    pub unoriented_conduits: usize,
    /// SCCs whose damped fixed point did not converge within 100 iterations.
    pub unconverged_sccs: usize,
    /// Iterations actually used by the C2 pipe-direction fixed point.
    pub pipe_propagation_iterations: usize,
    /// Iterations actually used by the C2 belt-chain fixed point.
    pub belt_propagation_iterations: usize,
}
