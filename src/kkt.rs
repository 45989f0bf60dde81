//! Assembly and factorization of the ADMM KKT system
//!
//! ```text
//! K = [ P + sigma*I   A^T            ]
//!     [ A             -diag(1/rho)   ]
//! ```
//!
//! The sparsity pattern is built once in [`KktSystem::new`]; the diagonal
//! blocks are the only entries that ever change, so every subsequent
//! iteration only rewrites those values before refactorizing.

use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use faer::{Col, Mat};
use problemo::Problem;

use crate::linalg::solver::LinearSolver;
use crate::{E, I};

/// Owns the symbolic KKT matrix, its numeric values, and the linear solver
/// handle used to factor and solve it.
pub struct KktSystem<Solver: LinearSolver> {
    n: usize,
    m: usize,
    mat: SparseColMat<I, E>,
    solver: Solver,
    /// Index into `mat`'s values for each `(P + sigma*I)` diagonal entry.
    p_diag_idx: Vec<I>,
    /// Index into `mat`'s values for each `-1/rho` diagonal entry.
    rho_diag_idx: Vec<I>,
    sigma: E,
}

#[allow(non_snake_case)]
impl<Solver: LinearSolver> KktSystem<Solver> {
    /// Builds the fixed sparsity pattern from `P` and `A`, with an initial
    /// `sigma` on the top-left block and `rho` (one entry per row of `A`)
    /// on the bottom-right block, then performs symbolic analysis.
    pub fn new(
        P: &SparseColMat<I, E>,
        A: &SparseColMat<I, E>,
        sigma: E,
        rho: &Col<E>,
    ) -> Result<Self, Problem> {
        let n = P.ncols();
        let m = A.nrows();

        let p_nnz = P.compute_nnz();
        let a_nnz = A.compute_nnz();
        let n_values = n + p_nnz + 2 * a_nnz + m;

        let mut col_ptrs = Vec::with_capacity(n + m + 1);
        let mut row_indices = Vec::with_capacity(n_values);
        let mut values = Vec::with_capacity(n_values);
        let mut p_diag_idx = Vec::with_capacity(n);
        let mut rho_diag_idx = Vec::with_capacity(m);

        let p_col_ptr = P.symbolic().col_ptr();
        let p_row_idx = P.symbolic().row_idx();
        let p_values = P.val();

        // Columns 0..n: the (P + sigma*I) block stacked on A's column j.
        col_ptrs.push(0);
        for j in 0..n {
            let mut has_diag = false;
            let start = p_col_ptr[j];
            let end = p_col_ptr[j + 1];
            for k in start..end {
                let row = p_row_idx[k];
                if row == j {
                    row_indices.push(row);
                    values.push(p_values[k] + sigma);
                    p_diag_idx.push(row_indices.len() - 1);
                    has_diag = true;
                } else {
                    row_indices.push(row);
                    values.push(p_values[k]);
                }
            }
            if !has_diag {
                row_indices.push(j);
                values.push(sigma);
                p_diag_idx.push(row_indices.len() - 1);
            }

            let a_col_ptr = A.symbolic().col_ptr();
            let a_row_idx = A.symbolic().row_idx();
            let a_values = A.val();
            for k in a_col_ptr[j]..a_col_ptr[j + 1] {
                row_indices.push(a_row_idx[k] + n);
                values.push(a_values[k]);
            }

            col_ptrs.push(row_indices.len());
        }

        // Columns n..n+m: A^T (via A's row-major view) stacked on -1/rho.
        let a_csr = A.to_row_major().expect("A is a valid sparse matrix");
        let a_row_ptr = a_csr.symbolic().row_ptr();
        let a_col_idx = a_csr.symbolic().col_idx();
        let a_csr_values = a_csr.val();

        for k in 0..m {
            let start = a_row_ptr[k];
            let end = a_row_ptr[k + 1];
            for idx in start..end {
                row_indices.push(a_col_idx[idx]);
                values.push(a_csr_values[idx]);
            }

            row_indices.push(n + k);
            values.push(-1.0 / rho[k]);
            rho_diag_idx.push(row_indices.len() - 1);

            col_ptrs.push(row_indices.len());
        }

        let mat = unsafe {
            let sym = SymbolicSparseColMat::new_unchecked(n + m, n + m, col_ptrs, None, row_indices);
            SparseColMat::<I, E>::new(sym, values)
        };

        let mut solver = Solver::new();
        solver.analyze(mat.as_ref())?;

        let mut system = Self {
            n,
            m,
            mat,
            solver,
            p_diag_idx,
            rho_diag_idx,
            sigma,
        };
        system.solver.factorize(system.mat.as_ref())?;
        Ok(system)
    }

    /// Rewrites the `-1/rho` diagonal and refactorizes. Called whenever the
    /// adaptive-rho schedule updates the penalty.
    pub fn update_rho(&mut self, rho: &Col<E>) -> Result<(), Problem> {
        let values = self.mat.val_mut();
        for k in 0..self.m {
            values[self.rho_diag_idx[k]] = -1.0 / rho[k];
        }
        self.solver.refactorize(self.mat.as_ref())
    }

    /// Rewrites the `sigma` contribution to the top-left diagonal and
    /// refactorizes. `sigma` is rarely changed mid-solve but the hook is
    /// kept symmetric with `update_rho`.
    pub fn update_sigma(&mut self, P: &SparseColMat<I, E>, sigma: E) -> Result<(), Problem> {
        self.sigma = sigma;
        let values = self.mat.val_mut();
        for j in 0..self.n {
            let p_jj = P.get(j, j).copied().unwrap_or(0.0);
            values[self.p_diag_idx[j]] = p_jj + sigma;
        }
        self.solver.refactorize(self.mat.as_ref())
    }

    /// Solves `K sol = rhs` for the stacked right-hand side of length
    /// `n + m`, returning `sol` of the same length.
    pub fn solve(&self, rhs: &Col<E>) -> Result<Col<E>, Problem> {
        let rhs_mat = Mat::from_fn(self.n + self.m, 1, |i, _| rhs[i]);
        let sol = self.solver.solve(rhs_mat.as_ref())?;
        Ok(Col::from_fn(self.n + self.m, |i| sol[(i, 0)]))
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn m(&self) -> usize {
        self.m
    }
}
