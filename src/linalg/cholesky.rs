//! Simplicial sparse LDLT factorization of the quasi-definite KKT system.
//!
//! The KKT matrix `[P + sigma*I, A^T; A, -diag(1/rho)]` is symmetric but
//! indefinite (negative definite in its lower-right block), so we factor
//! with LDLT rather than plain Cholesky. `analyze` computes an AMD
//! fill-reducing permutation and the symbolic factorization once; later
//! calls to `factorize` only touch numeric values.
//!
//! ```
//! use faer::sparse::{SparseColMat, Triplet};
//! use qcone::linalg::cholesky::SimplicialSparseCholesky;
//! use qcone::linalg::solver::LinearSolver;
//!
//! let n = 3;
//! let triplets = vec![
//!     Triplet::new(0, 0, 2.0),
//!     Triplet::new(0, 1, -1.0),
//!     Triplet::new(1, 0, -1.0),
//!     Triplet::new(1, 1, 2.0),
//!     Triplet::new(1, 2, -1.0),
//!     Triplet::new(2, 1, -1.0),
//!     Triplet::new(2, 2, 2.0),
//! ];
//! let mat = SparseColMat::try_new_from_triplets(n, n, &triplets).unwrap();
//!
//! let mut solver = SimplicialSparseCholesky::new();
//! solver.analyze(mat.as_ref()).unwrap();
//! solver.factorize(mat.as_ref()).unwrap();
//! let b = faer::Mat::from_fn(n, 1, |i, _| i as f64);
//! let _x = solver.solve(b.as_ref()).unwrap();
//! ```

use faer::dyn_stack::{MemBuffer, MemStack, StackReq};
use faer::linalg::cholesky::ldlt::factor::LdltRegularization;
use faer::perm::{Perm, PermRef};
use faer::prelude::{Reborrow, ReborrowMut};
use faer::sparse::linalg::amd;
use faer::sparse::linalg::cholesky::simplicial::{
    self, SimplicialLdltRef, SymbolicSimplicialCholesky,
};
use faer::sparse::{SparseColMat, SparseColMatRef, SymbolicSparseColMat};
use faer::{Mat, MatMut, MatRef};
use problemo::{Problem, ProblemResult};

use crate::linalg::solver::{LinearSolver, LinearSolverError};
use crate::{E, I};

/// Sparse LDLT solver, simplicial factorization.
#[allow(non_snake_case)]
pub struct SimplicialSparseCholesky {
    symbolic: Option<SymbolicSimplicialCholesky<I>>,
    L_values: Vec<E>,
    perm: Option<Perm<I>>,
    ldlt: Option<SimplicialLdltRef<'static, I, E>>,
}

impl LinearSolver for SimplicialSparseCholesky {
    fn new() -> Self {
        Self {
            symbolic: None,
            L_values: Vec::new(),
            perm: None,
            ldlt: None,
        }
    }

    fn analyze(&mut self, mat: SparseColMatRef<I, E>) -> Result<(), Problem> {
        let nnz = mat.compute_nnz();
        let dim = mat.ncols();
        let mat_symbolic = mat.symbolic();

        let (perm_fwd, perm_inv) = {
            let mut perm = Vec::new();
            let mut perm_inv = Vec::new();
            perm.try_reserve_exact(dim)
                .via(LinearSolverError::MemoryReservation)?;
            perm_inv
                .try_reserve_exact(dim)
                .via(LinearSolverError::MemoryReservation)?;
            perm.resize(dim, 0usize);
            perm_inv.resize(dim, 0usize);

            let mut mem = MemBuffer::try_new(amd::order_scratch::<I>(dim, nnz))
                .via(LinearSolverError::MemoryAllocation)?;
            amd::order(
                &mut perm,
                &mut perm_inv,
                mat_symbolic,
                amd::Control::default(),
                MemStack::new(&mut mem),
            )
            .via(LinearSolverError::SymbolicFactorization)?;

            (perm, perm_inv)
        };

        self.perm = Some(unsafe {
            Perm::new_unchecked(perm_fwd.into_boxed_slice(), perm_inv.into_boxed_slice())
        });

        let mat_upper = get_mat_upper(mat, self.perm.rb().unwrap().as_ref())?;

        self.symbolic = Some({
            let mut mem = MemBuffer::try_new(StackReq::any_of(&[
                simplicial::prefactorize_symbolic_cholesky_scratch::<I>(dim, nnz),
                simplicial::factorize_simplicial_symbolic_cholesky_scratch::<I>(dim),
            ]))
            .via(LinearSolverError::MemoryAllocation)?;
            let stack = MemStack::new(&mut mem);

            let mut etree = Vec::new();
            let mut col_counts = Vec::new();
            etree
                .try_reserve_exact(dim)
                .via(LinearSolverError::MemoryReservation)?;
            etree.resize(dim, 0isize);
            col_counts
                .try_reserve_exact(dim)
                .via(LinearSolverError::MemoryReservation)?;
            col_counts.resize(dim, 0usize);

            simplicial::prefactorize_symbolic_cholesky(
                &mut etree,
                &mut col_counts,
                mat_upper.symbolic(),
                stack,
            );
            simplicial::factorize_simplicial_symbolic_cholesky(
                mat_upper.symbolic(),
                // SAFETY: `etree` was filled by `prefactorize_symbolic_cholesky` above.
                unsafe { simplicial::EliminationTreeRef::from_inner(&etree) },
                &col_counts,
                stack,
            )
            .via(LinearSolverError::SymbolicFactorization)?
        });

        Ok(())
    }

    fn factorize(&mut self, mat: SparseColMatRef<I, E>) -> Result<(), Problem> {
        let symbolic = self
            .symbolic
            .as_ref()
            .ok_or(LinearSolverError::Uninitialized)?;
        let dim = mat.ncols();

        self.L_values = Vec::new();
        self.L_values
            .try_reserve_exact(symbolic.len_val())
            .via(LinearSolverError::MemoryReservation)?;
        self.L_values.resize(symbolic.len_val(), 0.0);

        let mat_upper = get_mat_upper(mat, self.perm.rb().unwrap().as_ref())?;

        let mut mem = MemBuffer::try_new(StackReq::all_of(&[
            simplicial::factorize_simplicial_numeric_ldlt_scratch::<I, E>(dim),
        ]))
        .via(LinearSolverError::MemoryAllocation)?;
        let stack = MemStack::new(&mut mem);

        simplicial::factorize_simplicial_numeric_ldlt::<I, E>(
            &mut self.L_values,
            mat_upper.rb(),
            LdltRegularization::default(),
            symbolic,
            stack,
        )
        .via(LinearSolverError::NumericFactorization)?;

        // SAFETY: `symbolic` and `L_values` are owned by `self` and outlive
        // the reference, which is dropped whenever either is reassigned.
        self.ldlt = Some(unsafe {
            std::mem::transmute::<SimplicialLdltRef<'_, I, E>, SimplicialLdltRef<'static, I, E>>(
                SimplicialLdltRef::<'_, I, E>::new(symbolic, &self.L_values),
            )
        });

        Ok(())
    }

    fn solve_in_place(&self, sol: &mut MatMut<E>) -> Result<(), Problem> {
        let symbolic = self
            .symbolic
            .as_ref()
            .ok_or(LinearSolverError::Uninitialized)?;
        let perm = self.perm.as_ref().ok_or(LinearSolverError::Uninitialized)?;
        let ldlt = self.ldlt.as_ref().ok_or(LinearSolverError::Uninitialized)?;

        let dim = symbolic.ncols();

        let mut mem = MemBuffer::try_new(StackReq::all_of(&[
            faer::perm::permute_rows_in_place_scratch::<I, E>(dim, 1),
            symbolic.solve_in_place_scratch::<E>(dim),
        ]))
        .via(LinearSolverError::MemoryAllocation)?;
        let stack = MemStack::new(&mut mem);

        faer::perm::permute_rows_in_place(sol.rb_mut(), perm.as_ref(), stack);
        ldlt.solve_in_place_with_conj(faer::Conj::No, sol.rb_mut(), faer::Par::Seq, stack);
        faer::perm::permute_rows_in_place(sol.rb_mut(), perm.as_ref().inverse(), stack);

        Ok(())
    }

    fn solve(&self, b: MatRef<E>) -> Result<Mat<E>, Problem> {
        let mut sol = b.to_owned();
        self.solve_in_place(&mut sol.as_mut())?;
        Ok(sol)
    }
}

fn get_mat_upper(
    mat: SparseColMatRef<I, E>,
    perm: PermRef<I>,
) -> Result<SparseColMat<I, E>, Problem> {
    let dim = mat.ncols();
    let nnz = mat.compute_nnz();

    let mut mat_col_ptrs = Vec::new();
    let mut mat_row_indices = Vec::new();
    let mut mat_values = Vec::new();

    mat_col_ptrs
        .try_reserve_exact(dim + 1)
        .via(LinearSolverError::MemoryReservation)?;
    mat_col_ptrs.resize(dim + 1, 0usize);
    mat_row_indices
        .try_reserve_exact(nnz)
        .via(LinearSolverError::MemoryReservation)?;
    mat_row_indices.resize(nnz, 0usize);
    mat_values
        .try_reserve_exact(nnz)
        .via(LinearSolverError::MemoryReservation)?;
    mat_values.resize(nnz, 0.0);

    let mut mem = MemBuffer::try_new(faer::sparse::utils::permute_self_adjoint_scratch::<I>(dim))
        .via(LinearSolverError::MemoryAllocation)?;
    faer::sparse::utils::permute_self_adjoint_to_unsorted(
        &mut mat_values,
        &mut mat_col_ptrs,
        &mut mat_row_indices,
        mat.rb(),
        perm.rb(),
        faer::Side::Upper,
        faer::Side::Upper,
        MemStack::new(&mut mem),
    );

    Ok(SparseColMat::<I, E>::new(
        unsafe { SymbolicSparseColMat::new_unchecked(dim, dim, mat_col_ptrs, None, mat_row_indices) },
        mat_values,
    ))
}
