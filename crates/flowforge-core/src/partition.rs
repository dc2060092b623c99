//! C7 — Districts and manifold blocks: topological community detection and
//! structural-equivalence grouping (spec.md §4.7). Grounded on the original
//! implementation's `district_analyzer.py`: its Leiden path has no
//! equivalent crate anywhere in the retrieval pack, so this follows its
//! `_fallback_communities` path, `networkx.community.greedy_modularity_communities`
//! (Clauset-Newman-Moore greedy agglomeration), reimplemented directly since
//! no graph-modularity crate is available either.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::algo::stable_index;
use crate::graph::{MachineCategory, ProductionGraph};
use crate::id::MachineId;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct District {
    pub id: usize,
    pub name: String,
    pub members: Vec<MachineId>,
    pub dominant_recipe: Option<String>,
    pub dominant_building: Option<String>,
    pub producing_count: usize,
    pub mean_productivity: f64,
    pub center_of_mass: (f64, f64),
    pub categories: BTreeMap<String, usize>,
    pub issue_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifoldBlock {
    pub id: String,
    pub recipe: String,
    pub building_name: String,
    pub members: Vec<MachineId>,
    pub count: usize,
    pub avg_clock: f64,
    pub producing_count: usize,
    pub total_expected_output: f64,
    pub total_actual_output: f64,
    pub oee: f64,
    pub input_sources: Vec<MachineId>,
    pub output_targets: Vec<MachineId>,
}

fn category_label(category: MachineCategory) -> &'static str {
    match category {
        MachineCategory::Producer => "production",
        MachineCategory::Generator => "generator",
        MachineCategory::Miner => "miner",
        MachineCategory::Logistics(_) => "logistics",
        MachineCategory::Storage => "storage",
        MachineCategory::Transport => "transport",
    }
}

/// Undirected, deduplicated conduit edges weighted by `max(flow_rate, 1.0)`
/// (spec.md §4.7 "Communities").
fn undirected_weighted_edges(
    graph: &ProductionGraph,
    pos: &BTreeMap<MachineId, usize>,
) -> Vec<(usize, usize, f64)> {
    let mut seen = std::collections::BTreeSet::new();
    let mut edges = Vec::new();
    for conduit in graph.conduits.values() {
        let (Some(src), Some(dst)) = (conduit.src, conduit.dst) else { continue };
        let (Some(&i), Some(&j)) = (pos.get(&src), pos.get(&dst)) else { continue };
        if i == j {
            continue;
        }
        let pair = (i.min(j), i.max(j));
        if seen.insert(pair) {
            edges.push((pair.0, pair.1, conduit.flow_rate.max(1.0)));
        }
    }
    edges
}

/// Clauset-Newman-Moore greedy modularity maximization: start every node in
/// its own community, repeatedly merge the adjacent pair with the largest
/// modularity gain, and stop once no merge would increase Q.
fn greedy_modularity_communities(n: usize, edges: &[(usize, usize, f64)]) -> Vec<Vec<usize>> {
    if n == 0 {
        return Vec::new();
    }

    let total_weight: f64 = edges.iter().map(|(_, _, w)| w).sum();
    if total_weight <= 0.0 {
        return (0..n).map(|i| vec![i]).collect();
    }
    let two_m = 2.0 * total_weight;

    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let mut a: Vec<f64> = vec![0.0; n];
    let mut e: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];

    for &(i, j, w) in edges {
        let frac = w / two_m;
        *e[i].entry(j).or_insert(0.0) += frac;
        *e[j].entry(i).or_insert(0.0) += frac;
        a[i] += frac;
        a[j] += frac;
    }

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if members[i].is_none() {
                continue;
            }
            for (&j, &e_ij) in &e[i] {
                if j <= i || members[j].is_none() {
                    continue;
                }
                let delta_q = 2.0 * (e_ij - a[i] * a[j]);
                if best.map(|(_, _, best_dq)| delta_q > best_dq).unwrap_or(true) {
                    best = Some((i, j, delta_q));
                }
            }
        }

        let Some((i, j, delta_q)) = best else { break };
        if delta_q <= 0.0 {
            break;
        }

        let absorbed = members[j].take().unwrap();
        members[i].as_mut().unwrap().extend(absorbed);

        let neighbors_j = std::mem::take(&mut e[j]);
        for (k, e_jk) in neighbors_j {
            if k == i {
                continue;
            }
            *e[i].entry(k).or_insert(0.0) += e_jk;
            e[k].remove(&j);
            *e[k].entry(i).or_insert(0.0) += e_jk;
        }
        e[i].remove(&j);
        a[i] += a[j];
        a[j] = 0.0;
    }

    members.into_iter().flatten().collect()
}

/// Build topological districts via greedy-modularity community detection
/// (spec.md §4.7 "Communities (Districts)"); `issue_counts` maps a machine
/// to how many issues name it, for the per-district `issue_count` rollup.
pub fn detect_districts(
    graph: &ProductionGraph,
    issue_counts: &BTreeMap<MachineId, usize>,
) -> (Vec<District>, BTreeMap<MachineId, usize>) {
    let (ids, _) = stable_index(graph);
    let pos: BTreeMap<MachineId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let edges = undirected_weighted_edges(graph, &pos);
    let communities = greedy_modularity_communities(ids.len(), &edges);

    let mut districts = Vec::with_capacity(communities.len());
    let mut node_to_district = BTreeMap::new();

    for (district_id, member_idxs) in communities.into_iter().enumerate() {
        let members: Vec<MachineId> = member_idxs.iter().map(|&i| ids[i]).collect();
        for &m in &members {
            node_to_district.insert(m, district_id);
        }
        districts.push(build_district(district_id, members, graph, issue_counts));
    }

    districts.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
    (districts, node_to_district)
}

fn build_district(
    id: usize,
    members: Vec<MachineId>,
    graph: &ProductionGraph,
    issue_counts: &BTreeMap<MachineId, usize>,
) -> District {
    let mut recipe_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut building_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    let mut producing_count = 0;
    let mut total_productivity = 0.0;
    let mut productivity_samples = 0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut issue_count = 0;

    for &member_id in &members {
        let Some(m) = graph.machine(member_id) else { continue };
        sum_x += m.position.0;
        sum_y += m.position.1;
        *categories.entry(category_label(m.category).to_string()).or_insert(0) += 1;
        *building_counts.entry(m.display_name.clone()).or_insert(0) += 1;
        if let Some(slug) = &m.recipe_slug {
            *recipe_counts.entry(slug.clone()).or_insert(0) += 1;
        }
        if m.producing {
            producing_count += 1;
        }
        if m.productivity > 0.0 {
            total_productivity += m.productivity;
            productivity_samples += 1;
        }
        issue_count += issue_counts.get(&member_id).copied().unwrap_or(0);
    }

    let n = members.len().max(1);
    let mean_productivity = if productivity_samples > 0 {
        total_productivity / productivity_samples as f64 * 100.0
    } else {
        0.0
    };

    let dominant_recipe = recipe_counts.into_iter().max_by_key(|(_, count)| *count).map(|(k, _)| k);
    let dominant_building = building_counts.iter().max_by_key(|(_, count)| **count).map(|(k, _)| k.clone());

    let name = if let Some(recipe) = &dominant_recipe {
        format!("{recipe} District")
    } else if let Some(building) = &dominant_building {
        format!("{building} Area")
    } else {
        format!("District {id}")
    };

    District {
        id,
        name,
        members,
        dominant_recipe,
        dominant_building,
        producing_count,
        mean_productivity,
        center_of_mass: (sum_x / n as f64, sum_y / n as f64),
        categories,
        issue_count,
    }
}

/// Group structurally-equivalent producers: same recipe, same sorted
/// predecessor set, same sorted successor set (spec.md §4.7 "Structural-
/// equivalence manifold blocks").
pub fn compute_manifold_blocks(graph: &ProductionGraph) -> (Vec<ManifoldBlock>, BTreeMap<MachineId, String>) {
    let mut predecessors: BTreeMap<MachineId, std::collections::BTreeSet<String>> = BTreeMap::new();
    let mut successors: BTreeMap<MachineId, std::collections::BTreeSet<String>> = BTreeMap::new();
    let mut pred_ids: BTreeMap<MachineId, std::collections::BTreeSet<MachineId>> = BTreeMap::new();
    let mut succ_ids: BTreeMap<MachineId, std::collections::BTreeSet<MachineId>> = BTreeMap::new();

    for conduit in graph.conduits.values() {
        let (Some(src), Some(dst)) = (conduit.src, conduit.dst) else { continue };
        let (Some(src_m), Some(dst_m)) = (graph.machine(src), graph.machine(dst)) else { continue };
        predecessors.entry(dst).or_default().insert(src_m.external_id.clone());
        successors.entry(src).or_default().insert(dst_m.external_id.clone());
        pred_ids.entry(dst).or_default().insert(src);
        succ_ids.entry(src).or_default().insert(dst);
    }

    let mut hash_groups: BTreeMap<String, Vec<MachineId>> = BTreeMap::new();
    for (id, m) in graph.machines.iter() {
        if m.category != MachineCategory::Producer {
            continue;
        }
        let Some(slug) = &m.recipe_slug else { continue };

        let preds = predecessors.get(&id).cloned().unwrap_or_default();
        let succs = successors.get(&id).cloned().unwrap_or_default();

        let key = format!("{slug}|{preds:?}|{succs:?}");
        let digest = Sha256::digest(key.as_bytes());
        let hash = digest.iter().take(8).map(|b| format!("{b:02x}")).collect::<String>();
        hash_groups.entry(hash).or_default().push(id);
    }

    let mut blocks = Vec::new();
    let mut node_to_block = BTreeMap::new();

    for (hash, members) in hash_groups {
        if members.len() < 2 {
            continue;
        }
        let first = graph.machine(members[0]).unwrap();
        let recipe = first.recipe_slug.clone().unwrap_or_default();
        let building_name = first.display_name.clone();

        let mut total_clock = 0.0;
        let mut producing_count = 0;
        let mut total_expected_output = 0.0;
        let mut total_actual_output = 0.0;

        for &id in &members {
            node_to_block.insert(id, hash.clone());
            let m = graph.machine(id).unwrap();
            total_clock += m.clock;
            if m.producing {
                producing_count += 1;
            }
            total_expected_output += m.total_expected_output();
            total_actual_output += m.available_output;
        }

        let avg_clock = total_clock / members.len() as f64;
        let oee = if total_expected_output > 0.0 {
            total_actual_output / total_expected_output * 100.0
        } else {
            0.0
        };

        blocks.push(ManifoldBlock {
            id: hash,
            recipe,
            building_name,
            count: members.len(),
            avg_clock,
            producing_count,
            total_expected_output,
            total_actual_output,
            oee,
            input_sources: pred_ids.get(&members[0]).cloned().unwrap_or_default().into_iter().collect(),
            output_targets: succ_ids.get(&members[0]).cloned().unwrap_or_default().into_iter().collect(),
            members,
        });
    }

    blocks.sort_by(|a, b| b.count.cmp(&a.count));
    (blocks, node_to_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Conduit, Machine};
    use crate::id::ItemId;

    fn machine(external_id: &str, category: MachineCategory) -> Machine {
        Machine {
            external_id: external_id.to_string(),
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
    fn districts_partition_every_machine_exactly_once() {
        let mut graph = ProductionGraph::new();
        let a = graph.add_machine(machine("a", MachineCategory::Miner));
        let b = graph.add_machine(machine("b", MachineCategory::Producer));
        let c = graph.add_machine(machine("c", MachineCategory::Storage));
        let conduit = graph.add_conduit(Conduit {
            external_id: "c1".into(),
            class_name: "Build_ConveyorBeltMk1_C".into(),
            display_name: "Belt Mk.1".into(),
            max_rate: 60.0,
            is_pipe: false,
            src: Some(a),
            dst: Some(b),
            flow_rate: 30.0,
        });
        graph.register_orientation(conduit);

        let (districts, node_to_district) = detect_districts(&graph, &BTreeMap::new());
        let mut covered: Vec<MachineId> = districts.iter().flat_map(|d| d.members.clone()).collect();
        covered.sort();
        let mut expected = vec![a, b, c];
        expected.sort();
        assert_eq!(covered, expected);
        assert_eq!(node_to_district.len(), 3);
    }

    #[test]
    fn manifold_block_groups_twins_with_same_recipe_and_wiring() {
        let mut graph = ProductionGraph::new();
        let source = graph.add_machine(machine("src", MachineCategory::Miner));

        let mut twin_a = machine("a", MachineCategory::Producer);
        twin_a.recipe_slug = Some("iron-ingot".into());
        twin_a.expected_outputs.insert(ItemId(0), 30.0);
        twin_a.available_output = 30.0;
        let a = graph.add_machine(twin_a);

        let mut twin_b = machine("b", MachineCategory::Producer);
        twin_b.recipe_slug = Some("iron-ingot".into());
        twin_b.expected_outputs.insert(ItemId(0), 30.0);
        twin_b.available_output = 15.0;
        let b = graph.add_machine(twin_b);

        for dst in [a, b] {
            let c = graph.add_conduit(Conduit {
                external_id: format!("c-{dst:?}"),
                class_name: "Build_ConveyorBeltMk1_C".into(),
                display_name: "Belt Mk.1".into(),
                max_rate: 60.0,
                is_pipe: false,
                src: Some(source),
                dst: Some(dst),
                flow_rate: 30.0,
            });
            graph.register_orientation(c);
        }

        let (blocks, node_to_block) = compute_manifold_blocks(&graph);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].count, 2);
        assert!((blocks[0].oee - 75.0).abs() < 1e-9);
        assert_eq!(node_to_block[&a], node_to_block[&b]);
    }
}
