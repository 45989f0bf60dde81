//! The positive semidefinite cone, in both full (unpacked) and scaled
//! upper-triangular packed storage.
//!
//! Projection eigendecomposes the symmetric matrix, clips eigenvalues at
//! zero, and reassembles `V diag(max(lambda, 0)) V^T`. The triangular
//! variant stores off-diagonal entries scaled by `sqrt(2)` so that the
//! Frobenius inner product of two packed vectors equals the matrix inner
//! product -- the same convention used by SOC/PSD solvers generally.

use faer::Mat;
use faer::linalg::solvers::{SelfAdjointEigen, Side};

use crate::E;

const SQRT2: E = std::f64::consts::SQRT_2;

fn unpack_full(v: &[E], n: usize) -> Mat<E> {
    Mat::from_fn(n, n, |i, j| v[i + j * n])
}

fn repack_full(m: &Mat<E>, v: &mut [E], n: usize) {
    for j in 0..n {
        for i in 0..n {
            v[i + j * n] = m[(i, j)];
        }
    }
}

fn unpack_triangle(v: &[E], n: usize) -> Mat<E> {
    let mut m = Mat::<E>::zeros(n, n);
    let mut k = 0;
    for j in 0..n {
        for i in 0..=j {
            let val = if i == j { v[k] } else { v[k] / SQRT2 };
            m[(i, j)] = val;
            m[(j, i)] = val;
            k += 1;
        }
    }
    m
}

fn repack_triangle(m: &Mat<E>, v: &mut [E], n: usize) {
    let mut k = 0;
    for j in 0..n {
        for i in 0..=j {
            v[k] = if i == j { m[(i, j)] } else { m[(i, j)] * SQRT2 };
            k += 1;
        }
    }
}

fn project_symmetric(mut m: Mat<E>) -> Mat<E> {
    let eig = m
        .self_adjoint_eigen(Side::Lower)
        .expect("eigendecomposition of symmetric matrix failed");
    let u = eig.U();
    let s = eig.S();
    let n = m.nrows();

    let mut clipped = Mat::<E>::zeros(n, n);
    for i in 0..n {
        let lambda = s[i].max(0.0);
        if lambda > 0.0 {
            for r in 0..n {
                for c in 0..n {
                    clipped[(r, c)] += lambda * u[(r, i)] * u[(c, i)];
                }
            }
        }
    }
    m.copy_from(&clipped);
    m
}

pub fn project_full(v: &mut [E], n: usize) {
    if n == 0 {
        return;
    }
    let m = unpack_full(v, n);
    let projected = project_symmetric(m);
    repack_full(&projected, v, n);
}

pub fn project_triangle(v: &mut [E], n: usize) {
    if n == 0 {
        return;
    }
    let m = unpack_triangle(v, n);
    let projected = project_symmetric(m);
    repack_triangle(&projected, v, n);
}

fn min_eigenvalue(m: &Mat<E>) -> E {
    let eig = m
        .self_adjoint_eigen(Side::Lower)
        .expect("eigendecomposition of symmetric matrix failed");
    let s = eig.S();
    (0..m.nrows())
        .map(|i| s[i])
        .fold(E::INFINITY, E::min)
}

pub fn in_psd_full(v: &[E], n: usize, tol: E) -> bool {
    if n == 0 {
        return true;
    }
    min_eigenvalue(&unpack_full(v, n)) >= -tol
}

pub fn in_psd_triangle(v: &[E], n: usize, tol: E) -> bool {
    if n == 0 {
        return true;
    }
    min_eigenvalue(&unpack_triangle(v, n)) >= -tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psd_matrix_is_unchanged() {
        // identity is already PSD
        let n = 3;
        let mut v = vec![0.0; n * n];
        for i in 0..n {
            v[i + i * n] = 1.0;
        }
        let before = v.clone();
        project_full(&mut v, n);
        for (a, b) in v.iter().zip(before.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn negative_definite_projects_to_zero() {
        let n = 2;
        let mut v = vec![-1.0, 0.0, 0.0, -1.0];
        project_full(&mut v, n);
        for x in v.iter() {
            assert!(x.abs() < 1e-9);
        }
    }

    #[test]
    fn triangle_round_trip_preserves_diagonal_of_psd_matrix() {
        let n = 2;
        // packed [ (0,0), (0,1), (1,1) ] = identity
        let mut v = vec![1.0, 0.0, 1.0];
        let before = v.clone();
        project_triangle(&mut v, n);
        for (a, b) in v.iter().zip(before.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let n = 2;
        let mut v = vec![1.0, 2.0, 2.0, 1.0];
        project_full(&mut v, n);
        let once = v.clone();
        project_full(&mut v, n);
        for (a, b) in v.iter().zip(once.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
    }
}
