//! C5 — Issue Detector: a fixed, independent set of rules over the
//! propagated graph (spec.md §4.5), grounded directly on the original
//! implementation's `analyze_supply_chain` (`graph_analyzer.py`) — not the
//! older, six-rule `analyze_issues` the save parser also exposes.

use crate::catalog::LogisticKind;
use crate::graph::{Conduit, Machine, MachineCategory, ProductionGraph};
use crate::id::{ConduitId, MachineId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IssueCategory {
    BeltBottleneck,
    InputStarvation,
    ClockTooHigh,
    OutputBackup,
    SplitterOverload,
    MergerOverload,
    DeadEnd,
    NoInput,
    IdleMachine,
    NoRecipe,
    IdleGenerator,
    UnderutilizedMiner,
}

impl IssueCategory {
    /// Stable label used as the `category` segment of a ticket-identity
    /// hash (spec.md §6).
    pub fn label(self) -> &'static str {
        match self {
            IssueCategory::BeltBottleneck => "belt_bottleneck",
            IssueCategory::InputStarvation => "input_starvation",
            IssueCategory::ClockTooHigh => "clock_too_high",
            IssueCategory::OutputBackup => "output_backup",
            IssueCategory::SplitterOverload => "splitter_overload",
            IssueCategory::MergerOverload => "merger_overload",
            IssueCategory::DeadEnd => "dead_end",
            IssueCategory::NoInput => "no_input",
            IssueCategory::IdleMachine => "idle_machine",
            IssueCategory::NoRecipe => "no_recipe",
            IssueCategory::IdleGenerator => "idle_generator",
            IssueCategory::UnderutilizedMiner => "underutilized_miner",
        }
    }
}

/// A step in a [`crate::rootcause`] trace, alternating nodes and edges from
/// the origin outward to the chokepoint (spec.md §3 "Issue").
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum TraceStep {
    Node(MachineId),
    Edge(ConduitId),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub machine_id: MachineId,
    pub conduit_id: Option<ConduitId>,
    pub flow_rate: Option<f64>,
    pub max_rate: Option<f64>,
    pub sufficiency: Option<f64>,
    pub clock: Option<f64>,
    /// Populated by [`crate::rootcause`] for Input Starvation / Output
    /// Backup issues only; `None` on every other category.
    pub root_cause: Option<String>,
    pub suggestion: Option<String>,
    pub dominator_id: Option<MachineId>,
    pub trace: Vec<TraceStep>,
}

impl Issue {
    fn new(
        category: IssueCategory,
        severity: Severity,
        title: &str,
        description: String,
        machine_id: MachineId,
    ) -> Self {
        Issue {
            category,
            severity,
            title: title.to_string(),
            description,
            machine_id,
            conduit_id: None,
            flow_rate: None,
            max_rate: None,
            sufficiency: None,
            clock: None,
            root_cause: None,
            suggestion: None,
            dominator_id: None,
            trace: Vec::new(),
        }
    }

    fn with_conduit(mut self, id: ConduitId) -> Self {
        self.conduit_id = Some(id);
        self
    }

    fn with_flow(mut self, flow_rate: f64, max_rate: f64) -> Self {
        self.flow_rate = Some(flow_rate);
        self.max_rate = Some(max_rate);
        self
    }

    fn with_sufficiency(mut self, sufficiency: f64) -> Self {
        self.sufficiency = Some(sufficiency);
        self
    }

    fn with_clock(mut self, clock: f64) -> Self {
        self.clock = Some(clock);
        self
    }
}

fn sum_incoming_max(graph: &ProductionGraph, m: &Machine) -> f64 {
    m.incoming.iter().filter_map(|c| graph.conduit(*c)).map(|c| c.max_rate).sum()
}

fn sum_outgoing_max(graph: &ProductionGraph, m: &Machine) -> f64 {
    m.outgoing.iter().filter_map(|c| graph.conduit(*c)).map(|c| c.max_rate).sum()
}

fn sum_outgoing_flow(graph: &ProductionGraph, m: &Machine) -> f64 {
    m.outgoing.iter().filter_map(|c| graph.conduit(*c)).map(|c| c.flow_rate).sum()
}

/// Run every rule over the graph and return the issue list sorted stably by
/// severity rank (error < warning < info), per spec.md §4.5.
pub fn detect_issues(graph: &ProductionGraph) -> Vec<Issue> {
    let mut issues = Vec::new();

    for (id, conduit) in graph.conduits.iter() {
        if conduit.is_oriented() {
            belt_bottleneck(id, conduit, &mut issues);
        }
    }

    for (id, m) in graph.machines.iter() {
        match m.category {
            MachineCategory::Producer => {
                input_starvation(id, m, &mut issues);
                clock_too_high(graph, id, m, &mut issues);
                output_backup(graph, id, m, &mut issues);
                dead_end(id, m, &mut issues);
                no_input(id, m, &mut issues);
                idle_machine(id, m, &mut issues);
                no_recipe(id, m, &mut issues);
            }
            MachineCategory::Logistics(LogisticKind::Splitter) => {
                splitter_overload(graph, id, m, &mut issues)
            }
            MachineCategory::Logistics(LogisticKind::Merger) => {
                merger_overload(graph, id, m, &mut issues)
            }
            MachineCategory::Generator => idle_generator(id, m, &mut issues),
            MachineCategory::Miner => underutilized_miner(graph, id, m, &mut issues),
            _ => {}
        }
    }

    issues.sort_by_key(|i| i.severity);
    issues
}

fn belt_bottleneck(id: ConduitId, c: &Conduit, issues: &mut Vec<Issue>) {
    if c.max_rate <= 0.0 || c.flow_rate <= 0.0 || c.flow_rate < 0.95 * c.max_rate {
        return;
    }
    let Some(machine_id) = c.dst else { return };
    let severity = if c.flow_rate > c.max_rate { Severity::Error } else { Severity::Warning };
    let description = format!(
        "{} is carrying {:.1}/{:.1} items per minute ({:.0}% of capacity).",
        c.display_name,
        c.flow_rate,
        c.max_rate,
        100.0 * c.flow_rate / c.max_rate
    );
    issues.push(
        Issue::new(IssueCategory::BeltBottleneck, severity, "Belt Bottleneck", description, machine_id)
            .with_conduit(id)
            .with_flow(c.flow_rate, c.max_rate),
    );
}

fn input_starvation(id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    let expected_input = m.total_expected_input();
    if expected_input <= 0.0 || m.available_input <= 0.0 {
        return;
    }
    let sufficiency = m.sufficiency();
    if sufficiency >= 0.9 {
        return;
    }
    let severity = if sufficiency < 0.5 { Severity::Error } else { Severity::Warning };
    let description = format!(
        "{} is receiving {:.1}/{:.1} items per minute, {:.0}% of what its recipe needs.",
        m.display_name, m.available_input, expected_input, 100.0 * sufficiency
    );
    issues.push(
        Issue::new(IssueCategory::InputStarvation, severity, "Input Starvation", description, id)
            .with_sufficiency(sufficiency),
    );
}

fn clock_too_high(graph: &ProductionGraph, id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    let expected_input = m.total_expected_input();
    let capacity = sum_incoming_max(graph, m);
    if expected_input <= 1.05 * capacity {
        return;
    }
    let description = format!(
        "{} is clocked to demand {:.1}/min but its incoming belts/pipes cap out at {:.1}/min.",
        m.display_name, expected_input, capacity
    );
    issues.push(
        Issue::new(IssueCategory::ClockTooHigh, Severity::Warning, "Clock Too High", description, id)
            .with_clock(m.clock),
    );
}

fn output_backup(graph: &ProductionGraph, id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    let expected_output = m.total_expected_output();
    let capacity = sum_outgoing_max(graph, m);
    if expected_output <= 1.05 * capacity {
        return;
    }
    let description = format!(
        "{} can produce {:.1}/min but its outgoing belts/pipes only carry {:.1}/min away.",
        m.display_name, expected_output, capacity
    );
    issues.push(Issue::new(
        IssueCategory::OutputBackup,
        Severity::Warning,
        "Output Backup",
        description,
        id,
    ));
}

fn splitter_overload(graph: &ProductionGraph, id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    let capacity = sum_outgoing_max(graph, m);
    if m.available_input <= 1.05 * capacity {
        return;
    }
    let description = format!(
        "{} is fed {:.1}/min but its outgoing belts only carry {:.1}/min combined.",
        m.display_name, m.available_input, capacity
    );
    issues.push(Issue::new(
        IssueCategory::SplitterOverload,
        Severity::Warning,
        "Splitter Overload",
        description,
        id,
    ));
}

fn merger_overload(graph: &ProductionGraph, id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    let Some(first_out) = m.outgoing.first().and_then(|c| graph.conduit(*c)) else { return };
    if m.available_input <= 1.05 * first_out.max_rate {
        return;
    }
    let description = format!(
        "{} is fed {:.1}/min but its outgoing belt only carries {:.1}/min.",
        m.display_name, m.available_input, first_out.max_rate
    );
    issues.push(Issue::new(
        IssueCategory::MergerOverload,
        Severity::Warning,
        "Merger Overload",
        description,
        id,
    ));
}

fn dead_end(id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    if !m.producing || m.total_expected_output() <= 0.0 || !m.outgoing.is_empty() {
        return;
    }
    let description = format!("{} has no outgoing belt or pipe for what it produces.", m.display_name);
    issues.push(Issue::new(IssueCategory::DeadEnd, Severity::Warning, "Dead End", description, id));
}

fn no_input(id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    if m.expected_inputs.is_empty() || !m.incoming.is_empty() {
        return;
    }
    let description = format!("{} needs input items but has no incoming belt or pipe.", m.display_name);
    issues.push(Issue::new(IssueCategory::NoInput, Severity::Error, "No Input", description, id));
}

fn idle_machine(id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    if !m.has_recipe() || m.producing || (m.incoming.is_empty() && m.outgoing.is_empty()) {
        return;
    }
    let description = format!("{} is connected but not currently producing.", m.display_name);
    issues.push(Issue::new(IssueCategory::IdleMachine, Severity::Warning, "Idle Machine", description, id));
}

fn no_recipe(id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    if m.has_recipe() {
        return;
    }
    let description = format!("{} has no recipe bound; its flow contribution is unknown.", m.display_name);
    issues.push(Issue::new(IssueCategory::NoRecipe, Severity::Error, "No Recipe", description, id));
}

fn idle_generator(id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    if m.producing {
        return;
    }
    let description = format!("{} is not currently generating power.", m.display_name);
    issues.push(Issue::new(IssueCategory::IdleGenerator, Severity::Info, "Idle Generator", description, id));
}

fn underutilized_miner(graph: &ProductionGraph, id: MachineId, m: &Machine, issues: &mut Vec<Issue>) {
    let nominal = m.total_expected_output();
    if nominal <= 0.0 {
        return;
    }
    let actual = sum_outgoing_flow(graph, m);
    if actual <= 0.0 || actual >= 0.5 * nominal {
        return;
    }
    let description = format!(
        "{} is only moving {:.1}/{:.1} items per minute of its nominal rate.",
        m.display_name, actual, nominal
    );
    issues.push(Issue::new(
        IssueCategory::UnderutilizedMiner,
        Severity::Info,
        "Underutilized Miner",
        description,
        id,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Conduit;
    use crate::id::ItemId;

    fn machine(category: MachineCategory) -> Machine {
        Machine {
            external_id: "m".into(),
            class_name: "Build_Test_C".into(),
            display_name: "Test Machine".into(),
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
    fn belt_at_full_capacity_is_a_warning_not_error() {
        let mut graph = ProductionGraph::new();
        let src = graph.add_machine(machine(MachineCategory::Producer));
        let dst = graph.add_machine(machine(MachineCategory::Storage));
        let c = graph.add_conduit(Conduit {
            external_id: "c".into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            display_name: "Belt Mk.1".into(),
            max_rate: 60.0,
            is_pipe: false,
            src: Some(src),
            dst: Some(dst),
            flow_rate: 60.0,
        });
        graph.register_orientation(c);
        let issues = detect_issues(&graph);
        let bottleneck = issues.iter().find(|i| i.category == IssueCategory::BeltBottleneck).unwrap();
        assert_eq!(bottleneck.severity, Severity::Warning);
    }

    #[test]
    fn belt_bottleneck_attaches_to_the_downstream_machine() {
        let mut graph = ProductionGraph::new();
        let src = graph.add_machine(machine(MachineCategory::Producer));
        let dst = graph.add_machine(machine(MachineCategory::Storage));
        let c = graph.add_conduit(Conduit {
            external_id: "c".into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            display_name: "Belt Mk.1".into(),
            max_rate: 60.0,
            is_pipe: false,
            src: Some(src),
            dst: Some(dst),
            flow_rate: 60.0,
        });
        graph.register_orientation(c);
        let issues = detect_issues(&graph);
        let bottleneck = issues.iter().find(|i| i.category == IssueCategory::BeltBottleneck).unwrap();
        assert_eq!(bottleneck.machine_id, dst);
        assert_ne!(bottleneck.machine_id, src);
    }

    #[test]
    fn severely_starved_producer_is_an_error() {
        let mut graph = ProductionGraph::new();
        let mut p = machine(MachineCategory::Producer);
        p.recipe = Some(crate::id::RecipeId(0));
        p.expected_inputs.insert(ItemId(0), 100.0);
        p.available_input = 20.0; // sufficiency 0.2
        let id = graph.add_machine(p);
        let issues = detect_issues(&graph);
        let starvation = issues.iter().find(|i| i.category == IssueCategory::InputStarvation).unwrap();
        assert_eq!(starvation.severity, Severity::Error);
        assert_eq!(starvation.machine_id, id);
    }

    #[test]
    fn producer_with_no_recipe_and_no_connections_is_flagged() {
        let mut graph = ProductionGraph::new();
        graph.add_machine(machine(MachineCategory::Producer));
        let issues = detect_issues(&graph);
        assert!(issues.iter().any(|i| i.category == IssueCategory::NoRecipe));
    }

    #[test]
    fn issues_are_sorted_error_before_warning_before_info() {
        let mut graph = ProductionGraph::new();
        graph.add_machine(machine(MachineCategory::Producer)); // No Recipe: error
        let mut gen = machine(MachineCategory::Generator);
        gen.producing = false;
        graph.add_machine(gen); // Idle Generator: info
        let issues = detect_issues(&graph);
        let severities: Vec<Severity> = issues.iter().map(|i| i.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
    }
}
