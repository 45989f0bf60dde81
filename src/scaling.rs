//! Ruiz equilibration: iterative diagonal scaling of `(P, q, A, b)` that
//! asymptotically equalizes row and column infinity-norms, plus the cost
//! scalar that keeps the objective well-conditioned alongside them.

use faer::sparse::SparseColMat;
use faer::{Col, Mat};

use crate::cones::ConeDescriptor;
use crate::{E, I};

/// Diagonal scaling matrices `D` (n x n), `E` (m x m), and the cost scalar
/// `c`, stored as dense vectors since both are diagonal by construction.
/// `D.diag > 0`, `E.diag > 0`, `c > 0` always hold once `compute` returns.
#[derive(Debug, Clone)]
pub struct ScaleMatrices {
    pub d: Col<E>,
    pub d_inv: Col<E>,
    pub e: Col<E>,
    pub e_inv: Col<E>,
    pub c: E,
    pub c_inv: E,
}

impl ScaleMatrices {
    fn identity(n: usize, m: usize) -> Self {
        Self {
            d: Col::from_fn(n, |_| 1.0),
            d_inv: Col::from_fn(n, |_| 1.0),
            e: Col::from_fn(m, |_| 1.0),
            e_inv: Col::from_fn(m, |_| 1.0),
            c: 1.0,
            c_inv: 1.0,
        }
    }
}

fn clamp_scaling(x: E, min_scaling: E, max_scaling: E) -> E {
    if x == 0.0 {
        1.0
    } else {
        x.clamp(min_scaling, max_scaling)
    }
}

fn col_inf_norms_stacked(p: &SparseColMat<I, E>, a: &SparseColMat<I, E>, n: usize) -> Vec<E> {
    let mut norms = vec![0.0; n];
    let p_col_ptr = p.symbolic().col_ptr();
    let p_values = p.val();
    let a_col_ptr = a.symbolic().col_ptr();
    let a_values = a.val();
    for col in 0..n {
        for k in p_col_ptr[col]..p_col_ptr[col + 1] {
            norms[col] = norms[col].max(p_values[k].abs());
        }
        for k in a_col_ptr[col]..a_col_ptr[col + 1] {
            norms[col] = norms[col].max(a_values[k].abs());
        }
    }
    norms
}

fn row_inf_norms(a: &SparseColMat<I, E>, m: usize) -> Vec<E> {
    let mut norms = vec![0.0; m];
    let a_col_ptr = a.symbolic().col_ptr();
    let a_row_idx = a.symbolic().row_idx();
    let a_values = a.val();
    for col in 0..a.ncols() {
        for k in a_col_ptr[col]..a_col_ptr[col + 1] {
            let row = a_row_idx[k];
            norms[row] = norms[row].max(a_values[k].abs());
        }
    }
    norms
}

fn scale_sparse_both_sides(
    mat: &SparseColMat<I, E>,
    left: &[E],
    right: &[E],
) -> SparseColMat<I, E> {
    let col_ptr = mat.symbolic().col_ptr();
    let row_idx = mat.symbolic().row_idx();
    let values = mat.val();
    let mut triplets = Vec::with_capacity(mat.compute_nnz());
    for col in 0..mat.ncols() {
        for k in col_ptr[col]..col_ptr[col + 1] {
            let row = row_idx[k];
            triplets.push((row, col, values[k] * left[row] * right[col]));
        }
    }
    SparseColMat::try_new_from_triplets(mat.nrows(), mat.ncols(), &triplets)
        .expect("scaling preserves sparsity pattern cardinality")
}

fn mat_dense_col_inf_norms(m: &Mat<E>) -> Vec<E> {
    (0..m.ncols())
        .map(|c| (0..m.nrows()).map(|r| m[(r, c)].abs()).fold(0.0, E::max))
        .collect()
}

/// Settings that drive Ruiz equilibration; a subset of the solver's overall
/// [`crate::admm::Settings`].
#[derive(Debug, Clone, Copy)]
pub struct ScalingSettings {
    pub iters: usize,
    pub min_scaling: E,
    pub max_scaling: E,
}

impl Default for ScalingSettings {
    fn default() -> Self {
        Self {
            iters: 10,
            min_scaling: 1e-4,
            max_scaling: 1e4,
        }
    }
}

/// Runs Ruiz equilibration on `(P, q, A, b)` in place, returning the
/// accumulated scale matrices. Cone blocks requiring a single scalar E
/// (SOC, PSD, exponential, power) are rectified after the iterative phase
/// so that `E` stays consistent with each cone's homogeneity.
#[allow(non_snake_case)]
pub fn equilibrate(
    P: &mut SparseColMat<I, E>,
    q: &mut Col<E>,
    A: &mut SparseColMat<I, E>,
    b: &mut Col<E>,
    cones: &[ConeDescriptor],
    settings: ScalingSettings,
) -> ScaleMatrices {
    let n = q.nrows();
    let m = b.nrows();
    let mut scale = ScaleMatrices::identity(n, m);

    if settings.iters == 0 {
        return scale;
    }

    for _ in 0..settings.iters {
        let mut d_work = col_inf_norms_stacked(P, A, n);
        let mut e_work = row_inf_norms(A, m);

        for x in d_work.iter_mut() {
            *x = clamp_scaling(*x, settings.min_scaling, settings.max_scaling).sqrt().recip();
        }
        for x in e_work.iter_mut() {
            *x = clamp_scaling(*x, settings.min_scaling, settings.max_scaling).sqrt().recip();
        }

        *P = scale_sparse_both_sides(P, &d_work, &d_work);
        *A = scale_sparse_both_sides(A, &e_work, &d_work);
        for i in 0..n {
            q[i] *= d_work[i];
        }
        for i in 0..m {
            b[i] *= e_work[i];
        }

        for i in 0..n {
            scale.d[i] *= d_work[i];
        }
        for i in 0..m {
            scale.e[i] *= e_work[i];
        }

        let dense_p = to_dense(P);
        let col_norms = mat_dense_col_inf_norms(&dense_p);
        let gamma = if col_norms.is_empty() {
            0.0
        } else {
            col_norms.iter().sum::<E>() / col_norms.len() as E
        };
        let eta = q.as_slice().iter().fold(0.0, |acc: E, v| acc.max(v.abs()));

        if gamma != 0.0 || eta != 0.0 {
            let scale_cost = gamma.max(clamp_scaling(eta, settings.min_scaling, settings.max_scaling));
            let c_tmp = 1.0 / scale_cost;
            *P = scale_values(P, c_tmp);
            for x in q.as_slice_mut() {
                *x *= c_tmp;
            }
            scale.c *= c_tmp;
        }
    }

    rectify_cone_scaling(A, b, cones, &mut scale);

    scale.d_inv = Col::from_fn(n, |i| 1.0 / scale.d[i]);
    scale.e_inv = Col::from_fn(m, |i| 1.0 / scale.e[i]);
    scale.c_inv = 1.0 / scale.c;

    scale
}

fn to_dense(mat: &SparseColMat<I, E>) -> Mat<E> {
    Mat::from_fn(mat.nrows(), mat.ncols(), |i, j| mat.get(i, j).copied().unwrap_or(0.0))
}

fn scale_values(mat: &SparseColMat<I, E>, factor: E) -> SparseColMat<I, E> {
    let col_ptr = mat.symbolic().col_ptr();
    let row_idx = mat.symbolic().row_idx();
    let values = mat.val();
    let mut triplets = Vec::with_capacity(mat.compute_nnz());
    for col in 0..mat.ncols() {
        for k in col_ptr[col]..col_ptr[col + 1] {
            triplets.push((row_idx[k], col, values[k] * factor));
        }
    }
    SparseColMat::try_new_from_triplets(mat.nrows(), mat.ncols(), &triplets)
        .expect("scaling preserves sparsity pattern cardinality")
}

/// For each cone requiring a single scalar E on its index range, replace
/// the block's diagonal entries by their mean and re-apply only the
/// E-part of the scaling to `A` and `b` on that range.
#[allow(non_snake_case)]
fn rectify_cone_scaling(
    A: &mut SparseColMat<I, E>,
    b: &mut Col<E>,
    cones: &[ConeDescriptor],
    scale: &mut ScaleMatrices,
) {
    for d in cones {
        if !d.cone.requires_scalar_scaling() {
            continue;
        }
        let range = d.range.clone();
        if range.is_empty() {
            continue;
        }
        let mean: E = range.clone().map(|i| scale.e[i]).sum::<E>() / range.len() as E;

        let mut row_factor = vec![1.0; b.nrows()];
        for i in range.clone() {
            row_factor[i] = mean / scale.e[i];
            scale.e[i] = mean;
        }

        *A = scale_sparse_both_sides(A, &row_factor, &vec![1.0; A.ncols()]);
        for i in range {
            b[i] *= row_factor[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cones::Cone;

    fn identity_problem() -> (SparseColMat<I, E>, Col<E>, SparseColMat<I, E>, Col<E>) {
        let p = SparseColMat::try_new_from_triplets(2, 2, &[(0, 0, 4.0), (1, 1, 2.0)]).unwrap();
        let a = SparseColMat::try_new_from_triplets(2, 2, &[(0, 0, 2.0), (1, 1, 8.0)]).unwrap();
        let q = Col::from_fn(2, |i| if i == 0 { 1.0 } else { -1.0 });
        let b = Col::from_fn(2, |_| 1.0);
        (p, q, a, b)
    }

    #[test]
    fn scale_matrices_stay_positive() {
        let (mut p, mut q, mut a, mut b) = identity_problem();
        let cones = vec![ConeDescriptor::new(Cone::Nonnegative { dim: 2 }, 0)];
        let scale = equilibrate(&mut p, &mut q, &mut a, &mut b, &cones, ScalingSettings::default());
        assert!(scale.d.as_slice().iter().all(|&x| x > 0.0));
        assert!(scale.e.as_slice().iter().all(|&x| x > 0.0));
        assert!(scale.c > 0.0);
    }

    #[test]
    fn inverse_round_trips() {
        let (mut p, mut q, mut a, mut b) = identity_problem();
        let cones = vec![ConeDescriptor::new(Cone::Nonnegative { dim: 2 }, 0)];
        let scale = equilibrate(&mut p, &mut q, &mut a, &mut b, &cones, ScalingSettings::default());
        for i in 0..2 {
            assert!((scale.d[i] * scale.d_inv[i] - 1.0).abs() < 1e-9);
            assert!((scale.e[i] * scale.e_inv[i] - 1.0).abs() < 1e-9);
        }
        assert!((scale.c * scale.c_inv - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_iters_is_identity() {
        let (mut p, mut q, mut a, mut b) = identity_problem();
        let cones = vec![ConeDescriptor::new(Cone::Nonnegative { dim: 2 }, 0)];
        let settings = ScalingSettings { iters: 0, ..Default::default() };
        let scale = equilibrate(&mut p, &mut q, &mut a, &mut b, &cones, settings);
        assert!(scale.d.as_slice().iter().all(|&x| x == 1.0));
        assert!(scale.e.as_slice().iter().all(|&x| x == 1.0));
        assert_eq!(scale.c, 1.0);
    }

    #[test]
    fn scalar_cone_block_gets_uniform_e() {
        let (mut p, mut q, mut a, mut b) = identity_problem();
        let cones = vec![ConeDescriptor::new(Cone::SecondOrder { dim: 2 }, 0)];
        let scale = equilibrate(&mut p, &mut q, &mut a, &mut b, &cones, ScalingSettings::default());
        assert!((scale.e[0] - scale.e[1]).abs() < 1e-9);
    }
}
