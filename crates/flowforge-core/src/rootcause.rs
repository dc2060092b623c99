//! C6 — Root-Cause Tracer: walk the dominator tree from a starved or backed
//! up machine toward the chokepoint that provably explains it (spec.md
//! §4.6). Grounded on the original implementation's `trace_root_cause` /
//! `trace_backup_cause` (`graph_analyzer.py`), which walk the same
//! dominator trees C4 builds for exactly this purpose.

use std::collections::BTreeSet;

use crate::algo::{forward_dominators, reverse_dominators, Dominator, DominatorTree};
use crate::graph::{Conduit, MachineCategory, ProductionGraph};
use crate::id::{ConduitId, MachineId};
use crate::issues::{Issue, IssueCategory, TraceStep};

const MAX_STEPS: usize = 30;
const CLOCK_OVERCLOCK_THRESHOLD: f64 = 2.5;
const BOTTLENECK_THRESHOLD: f64 = 0.99;
const DOMINATOR_STARVED_THRESHOLD: f64 = 0.95;

struct Verdict {
    root_cause: &'static str,
    suggestion: String,
    dominator_id: Option<MachineId>,
    trace: Vec<TraceStep>,
}

/// Augment every Input Starvation / Output Backup issue in place with a
/// `root_cause`, `suggestion`, `dominator_id`, and `trace`. A no-op for
/// every other category.
pub fn trace_root_causes(graph: &ProductionGraph, issues: &mut [Issue]) {
    let needs_forward = issues.iter().any(|i| i.category == IssueCategory::InputStarvation);
    let needs_reverse = issues.iter().any(|i| i.category == IssueCategory::OutputBackup);
    if !needs_forward && !needs_reverse {
        return;
    }

    let adj = graph.forward_adjacency();
    let forward_tree = needs_forward.then(|| forward_dominators(graph, &adj));
    let reverse_tree = needs_reverse.then(|| reverse_dominators(graph, &adj));

    for issue in issues.iter_mut() {
        let verdict = match issue.category {
            IssueCategory::InputStarvation => {
                forward_tree.as_ref().map(|tree| trace_input_starvation(graph, tree, issue.machine_id))
            }
            IssueCategory::OutputBackup => {
                reverse_tree.as_ref().map(|tree| trace_output_backup(graph, tree, issue.machine_id))
            }
            _ => None,
        };
        if let Some(verdict) = verdict {
            issue.root_cause = Some(verdict.root_cause.to_string());
            issue.suggestion = Some(verdict.suggestion);
            issue.dominator_id = verdict.dominator_id;
            issue.trace = verdict.trace;
        }
    }
}

fn connecting_conduit(
    graph: &ProductionGraph,
    src: MachineId,
    dst: MachineId,
) -> Option<(ConduitId, &Conduit)> {
    graph.machine(dst)?.incoming.iter().find_map(|&cid| {
        let c = graph.conduit(cid)?;
        (c.src == Some(src)).then_some((cid, c))
    })
}

fn complex_chain(trace: Vec<TraceStep>) -> Verdict {
    Verdict {
        root_cause: "Complex Chain",
        suggestion: "No single dominator explains this; inspect the trace manually.".to_string(),
        dominator_id: None,
        trace,
    }
}

fn feedback_loop(trace: Vec<TraceStep>) -> Verdict {
    Verdict {
        root_cause: "Feedback Loop",
        suggestion: "This chain revisits a node it already passed through; break the cycle to diagnose it.".to_string(),
        dominator_id: None,
        trace,
    }
}

/// Walk the forward dominator tree upward from a starved machine, per
/// spec.md §4.6's decisive-finding priority list.
fn trace_input_starvation(graph: &ProductionGraph, tree: &DominatorTree, origin: MachineId) -> Verdict {
    let mut current = origin;
    let mut visited = BTreeSet::from([origin]);
    let mut trace = vec![TraceStep::Node(origin)];

    for _ in 0..MAX_STEPS {
        let dom = match tree.immediate_dominator(current) {
            Some(Dominator::Node(d)) => d,
            Some(Dominator::Synthetic) | None => return complex_chain(trace),
        };

        let conduit = connecting_conduit(graph, dom, current);
        if let Some((conduit_id, _)) = conduit {
            trace.push(TraceStep::Edge(conduit_id));
        }
        trace.push(TraceStep::Node(dom));

        if !visited.insert(dom) {
            return feedback_loop(trace);
        }

        if let Some((conduit_id, c)) = conduit {
            if c.max_rate > 0.0 && c.flow_rate >= BOTTLENECK_THRESHOLD * c.max_rate {
                return Verdict {
                    root_cause: "Belt Bottleneck (Dominator)",
                    suggestion: format!(
                        "{} is running at capacity; widen it or add a parallel conduit.",
                        c.display_name
                    ),
                    dominator_id: Some(dom),
                    trace,
                };
            }
        }

        let Some(dom_machine) = graph.machine(dom) else { return complex_chain(trace) };

        if dom_machine.sufficiency() < DOMINATOR_STARVED_THRESHOLD {
            current = dom;
            continue;
        }

        match dom_machine.category {
            MachineCategory::Producer if dom_machine.clock < CLOCK_OVERCLOCK_THRESHOLD => {
                return Verdict {
                    root_cause: "Underclocked Dominator",
                    suggestion: format!(
                        "{} is clocked at {:.0}%; raising its clock will raise everything downstream of it.",
                        dom_machine.display_name,
                        dom_machine.clock * 100.0
                    ),
                    dominator_id: Some(dom),
                    trace,
                };
            }
            MachineCategory::Producer => {
                return Verdict {
                    root_cause: "Capacity-Limited Dominator",
                    suggestion: format!(
                        "{} is already at or near full clock; add another one in parallel.",
                        dom_machine.display_name
                    ),
                    dominator_id: Some(dom),
                    trace,
                };
            }
            MachineCategory::Miner if dom_machine.clock < CLOCK_OVERCLOCK_THRESHOLD => {
                return Verdict {
                    root_cause: "Underclocked Miner (Dominator)",
                    suggestion: format!(
                        "{} is clocked at {:.0}%; raise its clock speed.",
                        dom_machine.display_name,
                        dom_machine.clock * 100.0
                    ),
                    dominator_id: Some(dom),
                    trace,
                };
            }
            MachineCategory::Miner => {
                return Verdict {
                    root_cause: "Miner Rate Limit (Dominator)",
                    suggestion: format!(
                        "{} is already at its node's extraction cap; site another miner on a richer node.",
                        dom_machine.display_name
                    ),
                    dominator_id: Some(dom),
                    trace,
                };
            }
            _ => current = dom,
        }
    }

    complex_chain(trace)
}

/// Walk the reverse dominator tree downward from a backed up machine, per
/// spec.md §4.6's symmetric (and shorter) decisive-finding list.
fn trace_output_backup(graph: &ProductionGraph, tree: &DominatorTree, origin: MachineId) -> Verdict {
    let mut current = origin;
    let mut visited = BTreeSet::from([origin]);
    let mut trace = vec![TraceStep::Node(origin)];

    for _ in 0..MAX_STEPS {
        let dom = match tree.immediate_dominator(current) {
            Some(Dominator::Node(d)) => d,
            Some(Dominator::Synthetic) | None => return complex_chain(trace),
        };

        let conduit = connecting_conduit(graph, current, dom);
        if let Some((conduit_id, _)) = conduit {
            trace.push(TraceStep::Edge(conduit_id));
        }
        trace.push(TraceStep::Node(dom));

        if !visited.insert(dom) {
            return feedback_loop(trace);
        }

        if let Some((conduit_id, c)) = conduit {
            if c.max_rate > 0.0 && c.flow_rate >= BOTTLENECK_THRESHOLD * c.max_rate {
                return Verdict {
                    root_cause: "Belt Bottleneck (Dominator)",
                    suggestion: format!(
                        "{} is running at capacity; widen it or add a parallel conduit.",
                        c.display_name
                    ),
                    dominator_id: Some(dom),
                    trace,
                };
            }
        }

        let Some(dom_machine) = graph.machine(dom) else { return complex_chain(trace) };

        if dom_machine.category == MachineCategory::Producer && dom_machine.clock < CLOCK_OVERCLOCK_THRESHOLD {
            return Verdict {
                root_cause: "Downstream Underclocked (Dominator)",
                suggestion: format!(
                    "{} downstream is clocked at {:.0}%; raising its clock will drain the backup.",
                    dom_machine.display_name,
                    dom_machine.clock * 100.0
                ),
                dominator_id: Some(dom),
                trace,
            };
        }

        current = dom;
    }

    complex_chain(trace)
}
