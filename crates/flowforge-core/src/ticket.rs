//! Ticket-store interface (spec.md §6 "Persisted state"). The core only
//! computes the issue-identity hash and the create/update/auto-resolve
//! diff between two runs; the collaborator owning the actual ticket store
//! implements [`TicketSink`] and decides what "create"/"update" mean for
//! its storage.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::graph::ProductionGraph;
use crate::issues::Issue;

/// 16-hex-char identity hash of `building_id | category | recipe`, stable
/// across runs as long as the issue keeps naming the same machine, category,
/// and recipe.
pub fn issue_hash(building_id: &str, category: &str, recipe: &str) -> String {
    let key = format!("{building_id}|{category}|{recipe}");
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Compute an issue's identity hash against the graph it was detected on.
pub fn issue_hash_of(issue: &Issue, graph: &ProductionGraph) -> Option<String> {
    let machine = graph.machine(issue.machine_id)?;
    let recipe = machine.recipe_slug.as_deref().unwrap_or("");
    Some(issue_hash(&machine.external_id, issue.category.label(), recipe))
}

/// Interface to an external ticket store; the core never implements this
/// itself (spec.md §6: "the collaborator is responsible for inserting new
/// tickets, updating priority on existing ones, and auto-resolving").
pub trait TicketSink {
    fn create(&mut self, hash: &str);
    fn update(&mut self, hash: &str);
    fn auto_resolve(&mut self, hash: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TicketDiff {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub auto_resolved: Vec<String>,
}

/// Diff two issue-hash sets: hashes only in `current` are created, hashes
/// in both are updated, hashes only in `previous` are auto-resolved (spec.md
/// §8 boundary scenario 6).
pub fn diff_tickets(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> TicketDiff {
    TicketDiff {
        created: current.difference(previous).cloned().collect(),
        updated: current.intersection(previous).cloned().collect(),
        auto_resolved: previous.difference(current).cloned().collect(),
    }
}

/// Replay a diff against a concrete sink.
pub fn apply_diff(sink: &mut impl TicketSink, diff: &TicketDiff) {
    for hash in &diff.created {
        sink.create(hash);
    }
    for hash in &diff.updated {
        sink.update(hash);
    }
    for hash in &diff.auto_resolved {
        sink.auto_resolve(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_16_hex_chars() {
        let a = issue_hash("building-1", "belt_bottleneck", "iron-ingot");
        let b = issue_hash("building-1", "belt_bottleneck", "iron-ingot");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_inputs_produce_different_hashes() {
        let a = issue_hash("building-1", "belt_bottleneck", "iron-ingot");
        let b = issue_hash("building-2", "belt_bottleneck", "iron-ingot");
        assert_ne!(a, b);
    }

    /// spec.md §8 boundary scenario 6: {H1, H2, H3} then {H2, H4} resolves
    /// H1 and H3, creates H4, updates H2.
    #[test]
    fn diff_matches_auto_resolution_scenario() {
        let previous: BTreeSet<String> =
            ["H1", "H2", "H3"].into_iter().map(String::from).collect();
        let current: BTreeSet<String> = ["H2", "H4"].into_iter().map(String::from).collect();

        let diff = diff_tickets(&previous, &current);
        assert_eq!(diff.created, vec!["H4".to_string()]);
        assert_eq!(diff.updated, vec!["H2".to_string()]);
        assert_eq!(diff.auto_resolved, vec!["H1".to_string(), "H3".to_string()]);
    }

    struct RecordingSink {
        events: Vec<String>,
    }

    impl TicketSink for RecordingSink {
        fn create(&mut self, hash: &str) {
            self.events.push(format!("create:{hash}"));
        }
        fn update(&mut self, hash: &str) {
            self.events.push(format!("update:{hash}"));
        }
        fn auto_resolve(&mut self, hash: &str) {
            self.events.push(format!("resolve:{hash}"));
        }
    }

    #[test]
    fn apply_diff_drives_a_sink() {
        let mut sink = RecordingSink { events: Vec::new() };
        let diff = TicketDiff {
            created: vec!["H4".into()],
            updated: vec!["H2".into()],
            auto_resolved: vec!["H1".into(), "H3".into()],
        };
        apply_diff(&mut sink, &diff);
        assert_eq!(sink.events, vec!["create:H4", "update:H2", "resolve:H1", "resolve:H3"]);
    }
}
