//! Component G: iterative clique merging. [`CliqueGraphMerge`] works
//! directly on the reduced clique graph; [`ParentChildMerge`] walks the
//! clique tree bottom-up; [`NoMerge`] is the identity.
//!
//! Edges are never removed from the arena, only tombstoned (weight set to
//! `-inf`), so `edges`/`weights`/`inter` keep stable indices across the
//! whole merge run -- a `sortperm`-style traversal can reuse one
//! permutation buffer instead of re-deriving it every round.

use std::collections::{HashMap, HashSet};

use crate::chordal::clique_graph::ReducedCliqueGraph;
use crate::chordal::supernode::SuperNodeTree;

const TOMBSTONE: f64 = f64::NEG_INFINITY;
const IN_TREE: f64 = -1.0;

#[derive(Debug, Clone, Copy)]
pub struct MergeLogEntry {
    pub edge: (usize, usize),
    pub merged: bool,
}

/// Selects which merge algorithm drives `merge_cliques`.
#[derive(Debug, Clone, Copy)]
pub enum MergeStrategy {
    /// Greedy merges on the reduced clique graph, ranked by
    /// `ComplexityWeight` and gated by the running-intersection
    /// permissibility test.
    CliqueGraphMerge,
    /// Bottom-up merges along the clique tree, gated by a fill/size
    /// threshold.
    ParentChildMerge { t_fill: usize, t_size: usize },
    /// No-op.
    NoMerge,
}

fn complexity_weight(tree: &SuperNodeTree, a: usize, b: usize) -> f64 {
    let ca = tree.clique(a);
    let cb = tree.clique(b);
    let union_len = ca.union(&cb).count();
    (ca.len().pow(3) + cb.len().pow(3)) as f64 - (union_len.pow(3)) as f64
}

/// `true` iff merging `(a, b)` keeps the running-intersection property:
/// for every neighbor `n` shared by both cliques, `clique(a) ∩ clique(n)
/// == clique(b) ∩ clique(n)`.
fn is_permissible(
    tree: &SuperNodeTree,
    adjacency: &HashMap<usize, HashSet<usize>>,
    a: usize,
    b: usize,
) -> bool {
    let empty = HashSet::new();
    let neighbors_a = adjacency.get(&a).unwrap_or(&empty);
    let neighbors_b = adjacency.get(&b).unwrap_or(&empty);
    let common = neighbors_a.intersection(neighbors_b);

    let clique_a = tree.clique(a);
    let clique_b = tree.clique(b);
    for &n in common {
        if n == a || n == b {
            continue;
        }
        let clique_n = tree.clique(n);
        let ia: std::collections::BTreeSet<usize> = clique_a.intersection(&clique_n).copied().collect();
        let ib: std::collections::BTreeSet<usize> = clique_b.intersection(&clique_n).copied().collect();
        if ia != ib {
            return false;
        }
    }
    true
}

/// Greedy-merge driver for [`MergeStrategy::CliqueGraphMerge`]. Mutates
/// `tree` and `graph` in place; returns the merge log.
pub fn run_clique_graph_merge(
    tree: &mut SuperNodeTree,
    graph: &mut ReducedCliqueGraph,
) -> Vec<MergeLogEntry> {
    let mut weights: Vec<f64> = graph
        .edges
        .iter()
        .map(|&(a, b)| complexity_weight(tree, a, b))
        .collect();
    let mut log = Vec::new();

    loop {
        if tree.num <= 1 {
            break;
        }

        let mut order: Vec<usize> = (0..graph.edges.len()).collect();
        order.sort_by(|&i, &j| weights[j].partial_cmp(&weights[i]).unwrap());

        let candidate = order.iter().copied().find(|&idx| {
            weights[idx] > TOMBSTONE
                && is_permissible(tree, &graph.adjacency, graph.edges[idx].0, graph.edges[idx].1)
        });

        let Some(idx) = candidate else {
            break;
        };

        let (c1, c2) = graph.edges[idx];
        let weight = weights[idx];
        let do_merge = weight >= 0.0;

        log.push(MergeLogEntry { edge: (c1, c2), merged: do_merge });

        if !do_merge {
            break;
        }

        merge_two_cliques(tree, graph, &mut weights, c1, c2);

        if tree.num == 1 {
            break;
        }
    }

    graph.weights = weights;
    log
}

/// Absorbs `c2` into `c1` (`c1 > c2` by the `(max, min)` edge convention):
/// unions the supernode sets, tombstones every edge touching `c2`,
/// re-weights `c1`'s remaining edges, and rewires the adjacency table.
fn merge_two_cliques(
    tree: &mut SuperNodeTree,
    graph: &mut ReducedCliqueGraph,
    weights: &mut [f64],
    c1: usize,
    c2: usize,
) {
    let absorbed: std::collections::BTreeSet<usize> = tree.snd[c2].clone();
    tree.snd[c1].extend(absorbed);
    tree.snd[c2].clear();
    tree.num -= 1;

    let c2_neighbors: HashSet<usize> = graph.adjacency.remove(&c2).unwrap_or_default();
    for &n in &c2_neighbors {
        if n == c1 {
            continue;
        }
        if let Some(set) = graph.adjacency.get_mut(&n) {
            set.remove(&c2);
            set.insert(c1);
        }
        graph.adjacency.entry(c1).or_default().insert(n);
    }
    if let Some(set) = graph.adjacency.get_mut(&c1) {
        set.remove(&c2);
    }

    for (idx, &(a, b)) in graph.edges.iter().enumerate() {
        if a == c2 || b == c2 {
            weights[idx] = TOMBSTONE;
        } else if (a == c1 || b == c1) && weights[idx] > TOMBSTONE {
            weights[idx] = complexity_weight(tree, a, b);
        }
    }
}

/// Recomputes a clique tree from the (no-longer-acyclic) post-merge
/// graph: re-weight live edges by separator cardinality, take a
/// max-weight spanning tree (Kruskal), root at the clique containing the
/// highest-indexed vertex, and recompute parents/postorder/separators.
pub fn recompute_clique_tree(tree: &mut SuperNodeTree, graph: &mut ReducedCliqueGraph) {
    let n = tree.snd.len();
    let mut weights: Vec<f64> = graph
        .edges
        .iter()
        .zip(graph.weights.iter())
        .map(|(&(a, b), &w)| {
            if w <= TOMBSTONE {
                TOMBSTONE
            } else {
                tree.clique(a).intersection(&tree.clique(b)).count() as f64
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..graph.edges.len()).collect();
    order.sort_by(|&i, &j| weights[j].partial_cmp(&weights[i]).unwrap());

    let mut uf = UnionFind::new(n);
    let mut tree_edges = Vec::new();
    for idx in order {
        if weights[idx] <= TOMBSTONE {
            continue;
        }
        let (a, b) = graph.edges[idx];
        if uf.find(a) != uf.find(b) {
            uf.union(a, b);
            weights[idx] = IN_TREE;
            tree_edges.push((a, b));
        }
    }
    graph.weights = weights;

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in &tree_edges {
        children.entry(a).or_default().push(b);
        children.entry(b).or_default().push(a);
    }

    let root = (0..n)
        .filter(|&i| tree.is_live(i))
        .max_by_key(|&i| tree.clique(i).iter().copied().max().unwrap_or(0))
        .unwrap_or(0);

    let mut parent = vec![None; n];
    let mut visited = vec![false; n];
    let mut stack = vec![root];
    visited[root] = true;
    while let Some(u) = stack.pop() {
        for &v in children.get(&u).into_iter().flatten() {
            if !visited[v] {
                visited[v] = true;
                parent[v] = Some(u);
                stack.push(v);
            }
        }
    }

    tree.snd_par = parent;
    tree.snd_child = vec![Vec::new(); n];
    for (i, p) in tree.snd_par.iter().enumerate() {
        if let Some(p) = p {
            tree.snd_child[*p].push(i);
        }
    }
    tree.recompute_separators();
    tree.recompute_postorder();
}

/// Disjoint-set-union with path compression and union by rank, indexed by
/// *initial* clique indices so tombstoned cliques never shift the
/// numbering Kruskal relies on.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Runs [`MergeStrategy::ParentChildMerge`]: traverses cliques in
/// descending postorder, merging a clique into its parent whenever the
/// fill/size threshold permits.
pub fn run_parent_child_merge(tree: &mut SuperNodeTree, t_fill: usize, t_size: usize) -> Vec<MergeLogEntry> {
    let mut log = Vec::new();
    let order: Vec<usize> = tree.snd_post.clone();

    for &child in order.iter().rev() {
        if !tree.is_live(child) {
            continue;
        }
        let Some(par) = tree.snd_par[child].filter(|&p| tree.is_live(p)) else {
            continue;
        };

        let snd_par_len = tree.snd[par].len();
        let snd_child_len = tree.snd[child].len();
        let sep_len = tree.sep[child].len();

        let fill = (snd_par_len.saturating_sub(sep_len)) * (snd_child_len.saturating_sub(sep_len));
        let do_merge = fill <= t_fill || snd_par_len.max(snd_child_len) <= t_size;

        log.push(MergeLogEntry { edge: (par, child), merged: do_merge });

        if do_merge {
            let absorbed = tree.clique(child);
            tree.snd[par].extend(absorbed);
            tree.snd[child].clear();
            tree.sep[child] = Default::default();
            tree.num -= 1;

            let grandchildren = std::mem::take(&mut tree.snd_child[child]);
            for gc in &grandchildren {
                tree.snd_par[*gc] = Some(par);
            }
            tree.snd_child[par].retain(|&c| c != child);
            tree.snd_child[par].extend(grandchildren);
        }
    }

    if !log.is_empty() {
        tree.recompute_postorder();
    }
    log
}

/// [`MergeStrategy::NoMerge`]: leaves the tree untouched.
pub fn run_no_merge(_tree: &mut SuperNodeTree) -> Vec<MergeLogEntry> {
    Vec::new()
}
