//! Interface implemented by symmetric sparse linear solvers used to factor
//! and solve the KKT system.

use derive_more::{Display, Error};
use faer::sparse::SparseColMatRef;
use faer::{Mat, MatMut, MatRef};
use problemo::Problem;

use crate::{E, I};

#[derive(Debug, Display, Error, PartialEq)]
pub enum LinearSolverError {
    #[display("symbolic factorization error")]
    SymbolicFactorization,

    #[display("numeric factorization error")]
    NumericFactorization,

    #[display("solver used before analyze/factorize")]
    Uninitialized,

    #[display("memory reservation failed")]
    MemoryReservation,

    #[display("memory allocation failed")]
    MemoryAllocation,

    #[display("unable to solve linear system")]
    SolveFailed,
}

/// A symmetric sparse linear solver: `analyze` fixes the sparsity pattern
/// and fill-reducing permutation once; `factorize`/`refactorize` update the
/// numeric values; `solve`/`solve_in_place` apply the factorization.
pub trait LinearSolver {
    fn new() -> Self
    where
        Self: Sized;

    fn analyze(&mut self, mat: SparseColMatRef<I, E>) -> Result<(), Problem>;

    fn factorize(&mut self, mat: SparseColMatRef<I, E>) -> Result<(), Problem>;

    fn refactorize(&mut self, mat: SparseColMatRef<I, E>) -> Result<(), Problem> {
        self.factorize(mat)
    }

    fn solve_in_place(&self, b: &mut MatMut<E>) -> Result<(), Problem>;

    fn solve(&self, b: MatRef<E>) -> Result<Mat<E>, Problem>;
}
