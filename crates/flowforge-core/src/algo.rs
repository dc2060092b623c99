//! C4 — iterative graph algorithms shared by flow propagation and root-cause
//! tracing: Tarjan SCC, condensation + Kahn topological order, and the
//! simple (no balanced-forest) Lengauer-Tarjan dominator algorithm, run on
//! both the forward graph and its transpose (spec.md §4.4, §9 "Cyclic
//! graphs" — everything here uses an explicit frame stack, never the call
//! stack, so depth is bounded by heap, not recursion).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::graph::{MachineCategory, ProductionGraph};
use crate::id::MachineId;

pub type Adjacency = BTreeMap<MachineId, Vec<MachineId>>;

/// One SCC, in natural Tarjan pop order (sinks discovered first).
pub type Scc = Vec<MachineId>;

#[derive(Debug)]
pub struct SccDecomposition {
    pub sccs: Vec<Scc>,
    pub scc_of: BTreeMap<MachineId, usize>,
}

/// Iterative Tarjan SCC over an explicit frame stack `[(node, neighbor
/// cursor)]` (spec.md §4.4 "Tarjan SCC").
pub fn tarjan_scc(adj: &Adjacency) -> SccDecomposition {
    struct Frame {
        node: MachineId,
        cursor: usize,
    }

    let empty: Vec<MachineId> = Vec::new();
    let mut index_of: BTreeMap<MachineId, usize> = BTreeMap::new();
    let mut lowlink: BTreeMap<MachineId, usize> = BTreeMap::new();
    let mut on_stack: BTreeMap<MachineId, bool> = BTreeMap::new();
    let mut next_index = 0usize;
    let mut component_stack: Vec<MachineId> = Vec::new();
    let mut sccs: Vec<Scc> = Vec::new();

    let starts: Vec<MachineId> = adj.keys().copied().collect();
    for start in starts {
        if index_of.contains_key(&start) {
            continue;
        }
        index_of.insert(start, next_index);
        lowlink.insert(start, next_index);
        next_index += 1;
        on_stack.insert(start, true);
        component_stack.push(start);
        let mut call_stack = vec![Frame { node: start, cursor: 0 }];

        while let Some(frame) = call_stack.last_mut() {
            let neighbors = adj.get(&frame.node).unwrap_or(&empty);
            if frame.cursor < neighbors.len() {
                let next = neighbors[frame.cursor];
                frame.cursor += 1;
                if !index_of.contains_key(&next) {
                    index_of.insert(next, next_index);
                    lowlink.insert(next, next_index);
                    next_index += 1;
                    on_stack.insert(next, true);
                    component_stack.push(next);
                    call_stack.push(Frame { node: next, cursor: 0 });
                } else if *on_stack.get(&next).unwrap_or(&false) {
                    let node = frame.node;
                    let merged = lowlink[&next].min(lowlink[&node]);
                    lowlink.insert(node, merged);
                }
            } else {
                let node = frame.node;
                call_stack.pop();
                if let Some(parent) = call_stack.last() {
                    let merged = lowlink[&node].min(lowlink[&parent.node]);
                    lowlink.insert(parent.node, merged);
                }
                if lowlink[&node] == index_of[&node] {
                    let mut scc = Vec::new();
                    loop {
                        let w = component_stack.pop().expect("component stack underflow");
                        on_stack.insert(w, false);
                        scc.push(w);
                        if w == node {
                            break;
                        }
                    }
                    sccs.push(scc);
                }
            }
        }
    }

    let mut scc_of = BTreeMap::new();
    for (i, scc) in sccs.iter().enumerate() {
        for &n in scc {
            scc_of.insert(n, i);
        }
    }
    SccDecomposition { sccs, scc_of }
}

/// Condense cross-SCC edges and run Kahn's algorithm to yield SCC indices in
/// forward topological order (spec.md §4.4 "Condensation + topo sort").
/// Ties are broken by ascending SCC index, which keeps the ordering
/// deterministic across runs with the same input.
pub fn condensation_topo_order(decomp: &SccDecomposition, adj: &Adjacency) -> Vec<usize> {
    let n = decomp.sccs.len();
    let mut cond_adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for (node, neighbors) in adj {
        let su = decomp.scc_of[node];
        for nb in neighbors {
            let sv = decomp.scc_of[nb];
            if su != sv {
                cond_adj[su].insert(sv);
            }
        }
    }

    let mut indegree = vec![0usize; n];
    for edges in &cond_adj {
        for &v in edges {
            indegree[v] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(u) = queue.pop_front() {
        order.push(u);
        for &v in &cond_adj[u] {
            indegree[v] -= 1;
            if indegree[v] == 0 {
                queue.push_back(v);
            }
        }
    }
    order
}

/// Which real [`MachineId`] a dominator-tree node refers to, or the
/// synthetic root/sink the tree was rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominator {
    Synthetic,
    Node(MachineId),
}

/// An immediate-dominator map over a subset of machines, rooted at a
/// synthetic node not present in the graph (spec.md §4.4 "Lengauer-Tarjan
/// dominators").
#[derive(Debug, Default)]
pub struct DominatorTree {
    idom: BTreeMap<MachineId, Dominator>,
}

impl DominatorTree {
    pub fn immediate_dominator(&self, node: MachineId) -> Option<Dominator> {
        self.idom.get(&node).copied()
    }

    pub fn contains(&self, node: MachineId) -> bool {
        self.idom.contains_key(&node)
    }
}

/// Simple Lengauer-Tarjan: immediate dominator of every node reachable from
/// `root` (index 0), given `successors[i]` for every node index `0..n`.
/// Returns `None` at index `i` when `i` is unreached. No balanced LINK
/// forest — path-compressed EVAL only, matching spec.md §4.4's sizing note.
fn compute_dominators(n: usize, successors: &[Vec<usize>]) -> Vec<Option<usize>> {
    let root = 0usize;
    let mut dfnum = vec![usize::MAX; n];
    let mut vertex: Vec<usize> = Vec::new();
    let mut parent = vec![usize::MAX; n];
    let mut pred: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut frame_cursor = vec![0usize; n];

    dfnum[root] = 0;
    vertex.push(root);
    let mut stack = vec![root];
    while let Some(&node) = stack.last() {
        if frame_cursor[node] < successors[node].len() {
            let s = successors[node][frame_cursor[node]];
            frame_cursor[node] += 1;
            if !pred[s].contains(&node) {
                pred[s].push(node);
            }
            if dfnum[s] == usize::MAX {
                dfnum[s] = vertex.len();
                vertex.push(s);
                parent[s] = node;
                stack.push(s);
            }
        } else {
            stack.pop();
        }
    }

    let reached = vertex.len();
    let mut semi = dfnum.clone();
    let mut idom = vec![usize::MAX; n];
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    let mut label: Vec<usize> = (0..n).collect();
    let mut bucket: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in (1..reached).rev() {
        let w = vertex[i];
        for &v in &pred[w] {
            let u = eval(v, &mut ancestor, &mut label, &semi);
            if semi[u] < semi[w] {
                semi[w] = semi[u];
            }
        }
        bucket[vertex[semi[w]]].push(w);
        ancestor[w] = Some(parent[w]);

        let p = parent[w];
        let ready = std::mem::take(&mut bucket[p]);
        for v in ready {
            let u = eval(v, &mut ancestor, &mut label, &semi);
            idom[v] = if semi[u] < semi[v] { u } else { p };
        }
    }

    for i in 1..reached {
        let w = vertex[i];
        if idom[w] != vertex[semi[w]] {
            idom[w] = idom[idom[w]];
        }
    }
    idom[root] = root;

    (0..n)
        .map(|i| if dfnum[i] == usize::MAX { None } else { Some(idom[i]) })
        .collect()
}

fn eval(v: usize, ancestor: &mut [Option<usize>], label: &mut [usize], semi: &[usize]) -> usize {
    if ancestor[v].is_none() {
        return label[v];
    }
    compress(v, ancestor, label, semi);
    label[v]
}

/// Iterative form of the classic recursive `compress`: path-compress the
/// ancestor chain from `v` up to (but not past) the first node whose
/// ancestor has no further ancestor, updating `label` along the way so it
/// always names the node with the smallest semidominator on the
/// compressed path.
fn compress(v: usize, ancestor: &mut [Option<usize>], label: &mut [usize], semi: &[usize]) {
    let mut chain = Vec::new();
    let mut cur = v;
    loop {
        let a = match ancestor[cur] {
            Some(a) => a,
            None => break,
        };
        match ancestor[a] {
            Some(_) => {
                chain.push(cur);
                cur = a;
            }
            None => break,
        }
    }
    for &node in chain.iter().rev() {
        let anc = ancestor[node].expect("chain nodes always have an ancestor");
        if semi[label[anc]] < semi[label[node]] {
            label[node] = label[anc];
        }
        ancestor[node] = ancestor[anc];
    }
}

/// Stable ordering of a machine set used to build dominator-tree index
/// spaces: sorted by external id so the result does not depend on
/// [`slotmap`] insertion order (spec.md §8 "reordering input iterables does
/// not change the output").
pub(crate) fn stable_index(graph: &ProductionGraph) -> (Vec<MachineId>, BTreeMap<MachineId, usize>) {
    let mut ids: Vec<MachineId> = graph.machines.keys().collect();
    ids.sort_by(|a, b| {
        graph.machine(*a).unwrap().external_id.cmp(&graph.machine(*b).unwrap().external_id)
    });
    let mut index = BTreeMap::new();
    for (i, &id) in ids.iter().enumerate() {
        index.insert(id, i + 1); // 0 is reserved for the synthetic root/sink
    }
    (ids, index)
}

/// Build the forward dominator tree: synthetic root wired to every miner and
/// every node with no incoming edges (spec.md §4.4).
pub fn forward_dominators(graph: &ProductionGraph, adj: &Adjacency) -> DominatorTree {
    let (ids, index) = stable_index(graph);
    let n = ids.len() + 1;
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];

    let mut has_incoming = vec![false; ids.len() + 1];
    for neighbors in adj.values() {
        for nb in neighbors {
            has_incoming[index[nb]] = true;
        }
    }

    for (i, &id) in ids.iter().enumerate() {
        let idx = i + 1;
        let is_miner = graph.machine(id).map(|m| m.category == MachineCategory::Miner).unwrap_or(false);
        if is_miner || !has_incoming[idx] {
            successors[0].push(idx);
        }
        if let Some(neighbors) = adj.get(&id) {
            for nb in neighbors {
                successors[idx].push(index[nb]);
            }
        }
    }

    let idom = compute_dominators(n, &successors);
    to_tree(&ids, &idom)
}

/// Build the reverse dominator tree on the transpose graph: synthetic sink
/// wired to every storage-category node and every node with no outgoing
/// edges (spec.md §4.4 "Reverse dominators").
pub fn reverse_dominators(graph: &ProductionGraph, adj: &Adjacency) -> DominatorTree {
    let (ids, index) = stable_index(graph);
    let n = ids.len() + 1;
    let mut trans_adj: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (node, neighbors) in adj {
        let u = index[node];
        for nb in neighbors {
            trans_adj[index[nb]].push(u);
        }
    }

    for (i, &id) in ids.iter().enumerate() {
        let idx = i + 1;
        let is_storage = graph
            .machine(id)
            .map(|m| m.category.is_sink_category())
            .unwrap_or(false);
        let no_outgoing = adj.get(&id).map(|v| v.is_empty()).unwrap_or(true);
        if is_storage || no_outgoing {
            trans_adj[0].push(idx);
        }
    }

    let idom = compute_dominators(n, &trans_adj);
    to_tree(&ids, &idom)
}

fn to_tree(ids: &[MachineId], idom: &[Option<usize>]) -> DominatorTree {
    let mut tree = DominatorTree::default();
    for (i, &id) in ids.iter().enumerate() {
        let idx = i + 1;
        if let Some(d) = idom[idx] {
            let dominator = if d == 0 { Dominator::Synthetic } else { Dominator::Node(ids[d - 1]) };
            tree.idom.insert(id, dominator);
        }
    }
    tree
}
