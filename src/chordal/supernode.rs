//! The clique tree representation shared by clique-graph construction,
//! merging, and the chordal decomposer.

use std::collections::BTreeSet;

/// One node of a clique tree: its own (unique) vertex set and the
/// separator it shares with its parent.
///
/// `snd[i] ∩ sep[i] = ∅` always holds; the clique's full vertex set is
/// `snd[i] ∪ sep[i]`. An empty `snd` marks a clique that has been merged
/// away -- it stays in the arena (so indices never shift) but is skipped
/// by every traversal.
#[derive(Debug, Clone)]
pub struct SuperNodeTree {
    pub snd: Vec<BTreeSet<usize>>,
    pub sep: Vec<BTreeSet<usize>>,
    pub snd_par: Vec<Option<usize>>,
    pub snd_child: Vec<Vec<usize>>,
    /// Postorder over the original vertex set.
    pub post: Vec<usize>,
    /// Postorder over live clique indices.
    pub snd_post: Vec<usize>,
    /// Number of cliques with nonempty `snd`.
    pub num: usize,
}

impl SuperNodeTree {
    /// Builds a tree from parallel `snd`/`sep` arrays and explicit parent
    /// pointers (`None` for roots of the clique forest).
    pub fn new(
        snd: Vec<BTreeSet<usize>>,
        sep: Vec<BTreeSet<usize>>,
        snd_par: Vec<Option<usize>>,
    ) -> Self {
        assert_eq!(snd.len(), sep.len());
        assert_eq!(snd.len(), snd_par.len());
        let n = snd.len();
        let mut snd_child = vec![Vec::new(); n];
        for (i, par) in snd_par.iter().enumerate() {
            if let Some(p) = par {
                snd_child[*p].push(i);
            }
        }
        let num = snd.iter().filter(|s| !s.is_empty()).count();
        let mut tree = Self {
            snd,
            sep,
            snd_par,
            snd_child,
            post: Vec::new(),
            snd_post: Vec::new(),
            num,
        };
        tree.recompute_postorder();
        tree
    }

    /// Full clique vertex set `snd[i] ∪ sep[i]`.
    pub fn clique(&self, i: usize) -> BTreeSet<usize> {
        self.snd[i].union(&self.sep[i]).copied().collect()
    }

    pub fn is_live(&self, i: usize) -> bool {
        !self.snd[i].is_empty()
    }

    /// Roots of the clique forest: live nodes with no parent, or whose
    /// parent chain leads to a dead (merged-away) node.
    fn roots(&self) -> Vec<usize> {
        (0..self.snd.len())
            .filter(|&i| self.is_live(i) && self.root_of(i).is_none())
            .collect()
    }

    fn root_of(&self, i: usize) -> Option<usize> {
        self.snd_par[i].filter(|&p| self.is_live(p))
    }

    /// Recomputes `snd_post` via an iterative post-order DFS over the live
    /// forest. Dead cliques never appear.
    pub fn recompute_postorder(&mut self) {
        self.snd_post.clear();
        let mut visited = vec![false; self.snd.len()];
        for root in self.roots() {
            self.postorder_from(root, &mut visited);
        }
    }

    fn postorder_from(&mut self, root: usize, visited: &mut [bool]) {
        // iterative postorder via an explicit stack with a visited marker
        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if visited[node] {
                continue;
            }
            if expanded {
                visited[node] = true;
                self.snd_post.push(node);
            } else {
                stack.push((node, true));
                for &child in &self.snd_child[node] {
                    if self.is_live(child) {
                        stack.push((child, false));
                    }
                }
            }
        }
    }

    /// Reassigns `sep[c] = snd[c] ∩ snd[par(c)]` then `snd[c] -= sep[c]`,
    /// for every live non-root clique. Used after a structural change to
    /// parent pointers (e.g. Kruskal spanning-tree recomputation).
    pub fn recompute_separators(&mut self) {
        for i in 0..self.snd.len() {
            if !self.is_live(i) {
                continue;
            }
            if let Some(par) = self.snd_par[i] {
                if self.is_live(par) {
                    let full_i = self.clique(i);
                    let full_par = self.clique(par);
                    let new_sep: BTreeSet<usize> = full_i.intersection(&full_par).copied().collect();
                    self.snd[i] = full_i.difference(&new_sep).copied().collect();
                    self.sep[i] = new_sep;
                    continue;
                }
            }
            self.sep[i] = BTreeSet::new();
        }
    }
}
