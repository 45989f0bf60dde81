//! Component H: splits one chordal PSD cone into one smaller PSD cone per
//! clique, plus the post-solve completion that stitches the per-clique
//! duals back into a single PSD matrix.

use std::collections::BTreeSet;

use faer::Mat;

use crate::chordal::supernode::SuperNodeTree;
use crate::E;

/// One clique's PSD sub-cone: its live index in the tree and the sorted
/// list of original vertices it covers.
#[derive(Debug, Clone)]
pub struct CliqueCone {
    pub clique_index: usize,
    pub vertices: Vec<usize>,
}

/// Splits the `n`-vertex chordal PSD cone described by `tree` into one
/// `PsdTriangle` cone per live clique. The caller is responsible for
/// adding the equality rows to `A` that force overlapping clique entries
/// (on shared separator vertices) to agree -- that wiring depends on the
/// surrounding problem's column layout and isn't part of this module's
/// contract.
pub fn decompose(tree: &SuperNodeTree) -> Vec<CliqueCone> {
    (0..tree.snd.len())
        .filter(|&c| tree.is_live(c))
        .map(|c| CliqueCone {
            clique_index: c,
            vertices: tree.clique(c).into_iter().collect(),
        })
        .collect()
}

/// For every pair of live cliques sharing a vertex, the index pairs
/// `(clique, local_row, local_col)` that a consistency constraint must
/// equate. Used by the surrounding assembler to emit equality rows.
pub fn consistency_constraints(tree: &SuperNodeTree) -> Vec<(usize, usize, usize, usize)> {
    let cones = decompose(tree);
    let mut constraints = Vec::new();
    for i in 0..cones.len() {
        for j in (i + 1)..cones.len() {
            let a = &cones[i];
            let b = &cones[j];
            let shared: Vec<usize> = a
                .vertices
                .iter()
                .copied()
                .filter(|v| b.vertices.contains(v))
                .collect();
            for (li, &va) in shared.iter().enumerate() {
                for &vb in shared.iter().skip(li) {
                    let ra = a.vertices.iter().position(|&v| v == va).unwrap();
                    let ca = a.vertices.iter().position(|&v| v == vb).unwrap();
                    let rb = b.vertices.iter().position(|&v| v == va).unwrap();
                    let cb = b.vertices.iter().position(|&v| v == vb).unwrap();
                    if ra <= ca {
                        constraints.push((a.clique_index, ra, ca, i));
                        constraints.push((b.clique_index, rb, cb, j));
                    }
                }
            }
        }
    }
    constraints
}

/// Solves `A x = b` for a small dense symmetric `A` via Gauss-Jordan
/// elimination with partial pivoting. Separator blocks in chordal
/// completion are small, so this avoids pulling in a general sparse
/// factorization for an `O(sep^3)` operation that runs once per clique.
fn solve_dense(a: &[Vec<E>], b: &[Vec<E>]) -> Vec<Vec<E>> {
    let n = a.len();
    let rhs_cols = if n == 0 { 0 } else { b[0].len() };
    let mut aug: Vec<Vec<E>> = (0..n).map(|i| {
        let mut row = a[i].clone();
        row.extend_from_slice(&b[i]);
        row
    }).collect();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| aug[r1][col].abs().partial_cmp(&aug[r2][col].abs()).unwrap())
            .unwrap();
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        if pivot.abs() < 1e-14 {
            continue;
        }
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..aug[col].len() {
                aug[row][k] -= factor * aug[col][k];
            }
        }
    }

    (0..n).map(|i| aug[i][n..n + rhs_cols].to_vec()).collect()
}

/// Reconstructs the full `n x n` PSD-completable matrix from per-clique
/// dense duals, walking the clique tree from root to leaves (the reverse
/// of `tree.snd_post`, which lists leaves before their parent).
///
/// `clique_values[c]` must be a dense, symmetric matrix ordered by
/// `tree.clique(c)`'s sorted vertex list, for every live clique `c`.
pub fn complete_psd(
    n: usize,
    tree: &SuperNodeTree,
    clique_values: &std::collections::HashMap<usize, Mat<E>>,
) -> Mat<E> {
    let mut y = vec![vec![0.0_f64; n]; n];
    let mut filled = vec![vec![false; n]; n];

    let mut order: Vec<usize> = tree.snd_post.clone();
    order.reverse();

    for &c in &order {
        let verts: Vec<usize> = tree.clique(c).into_iter().collect();
        let values = &clique_values[&c];

        for (li, &vi) in verts.iter().enumerate() {
            for (lj, &vj) in verts.iter().enumerate() {
                y[vi][vj] = values[(li, lj)];
                filled[vi][vj] = true;
            }
        }

        let sep: BTreeSet<usize> = tree.sep[c].clone();
        if sep.is_empty() {
            continue;
        }
        let sep_list: Vec<usize> = sep.into_iter().collect();
        let new_verts: Vec<usize> = verts.iter().copied().filter(|v| !sep_list.contains(v)).collect();

        let already_known: Vec<usize> = (0..n)
            .filter(|&k| filled[sep_list[0]][k] && !verts.contains(&k))
            .collect();
        if new_verts.is_empty() || already_known.is_empty() {
            continue;
        }

        let sep_block: Vec<Vec<E>> = sep_list.iter().map(|&a| sep_list.iter().map(|&b| y[a][b]).collect()).collect();
        let rhs: Vec<Vec<E>> = sep_list.iter().map(|&a| already_known.iter().map(|&k| y[a][k]).collect()).collect();
        let solved = solve_dense(&sep_block, &rhs);

        for (li, &vi) in new_verts.iter().enumerate() {
            for (kj, &vk) in already_known.iter().enumerate() {
                let mut acc = 0.0;
                for (si, &_s) in sep_list.iter().enumerate() {
                    acc += y[vi][sep_list[si]] * solved[si][kj];
                }
                y[vi][vk] = acc;
                y[vk][vi] = acc;
                filled[vi][vk] = true;
                filled[vk][vi] = true;
                let _ = li;
            }
        }
    }

    Mat::from_fn(n, n, |i, j| y[i][j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    fn set(v: &[usize]) -> BTreeSet<usize> {
        v.iter().copied().collect()
    }

    /// S4: path clique tree {0,1} - {1,2} - {2,3} - {3,4} over 5 vertices.
    fn path_tree() -> SuperNodeTree {
        let snd = vec![set(&[0]), set(&[1]), set(&[2]), set(&[3, 4])];
        let sep = vec![BTreeSet::new(), set(&[0]), set(&[1]), set(&[2])];
        let par = vec![None, Some(0), Some(1), Some(2)];
        SuperNodeTree::new(snd, sep, par)
    }

    #[test]
    fn decompose_yields_one_cone_per_live_clique() {
        let tree = path_tree();
        let cones = decompose(&tree);
        assert_eq!(cones.len(), 4);
        assert_eq!(cones[3].vertices, vec![2, 3, 4]);
    }

    #[test]
    fn completion_reproduces_known_clique_blocks() {
        let tree = path_tree();
        let mut values = HashMap::new();
        // clique 0: {0} -- 1x1
        values.insert(0, Mat::from_fn(1, 1, |_, _| 2.0));
        // clique 1: vertices {0,1} (sorted)
        values.insert(1, Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 0.5 }));
        // clique 2: vertices {1,2}
        values.insert(2, Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 0.3 }));
        // clique 3: vertices {2,3,4}
        values.insert(
            3,
            Mat::from_fn(3, 3, |i, j| if i == j { 2.0 } else { 0.1 }),
        );

        let y = complete_psd(5, &tree, &values);

        assert!((y[(0, 0)] - 2.0).abs() < 1e-9);
        assert!((y[(0, 1)] - 0.5).abs() < 1e-9);
        assert!((y[(1, 2)] - 0.3).abs() < 1e-9);
        assert!((y[(2, 3)] - 0.1).abs() < 1e-9);
        assert!((y[(3, 4)] - 0.1).abs() < 1e-9);
        // symmetry
        for i in 0..5 {
            for j in 0..5 {
                assert!((y[(i, j)] - y[(j, i)]).abs() < 1e-9);
            }
        }
    }
}
