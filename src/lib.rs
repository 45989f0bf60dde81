#![allow(non_snake_case)]

//! A first-order conic quadratic program solver based on the Alternating
//! Direction Method of Multipliers (ADMM).
//!
//! The solver handles problems of the form
//!
//! ```text
//! minimize   (1/2) x^T P x + q^T x
//! subject to  A x + s = b,  s in K
//! ```
//!
//! where `K` is a Cartesian product of convex cones (see [`cones`]). Large
//! positive semidefinite blocks of `K` may be decomposed along a chordal
//! sparsity pattern (see [`chordal`]) to trade the cost of one large
//! projection for many small ones.

use faer::traits::ComplexField;
use faer::traits::num_traits::Float;
use faer::Index;

pub trait ElementType: ComplexField + Float {}
impl<T> ElementType for T where T: ComplexField + Float {}

pub trait IndexType: Copy + PartialEq + Eq + Ord + Index {}
impl<T> IndexType for T where T: Copy + PartialEq + Eq + Ord + Index {}

/// Scalar element type used throughout the solver.
pub type E = f64;
/// Sparse-matrix index type used throughout the solver.
pub type I = usize;

pub mod admm;
pub mod callback;
pub mod chordal;
pub mod cones;
pub mod kkt;
pub mod linalg;
pub mod problem;
pub mod residuals;
pub mod scaling;
pub mod terminators;

pub use admm::{AdmmSolver, Settings, SolveResult};
pub use problem::Problem;

/// Terminal status codes reported at the boundary of a solve.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub enum Status {
    #[default]
    /// The solver is still running.
    Unsolved,
    /// Primal and dual residuals fell below tolerance.
    Solved,
    /// A primal infeasibility certificate was detected.
    PrimalInfeasible,
    /// A dual infeasibility certificate was detected.
    DualInfeasible,
    /// `max_iter` was reached before convergence.
    MaxIterReached,
    /// `timelimit` elapsed before convergence.
    TimeLimitReached,
    /// A [`terminators::InterruptTerminator`] observed Ctrl-C.
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_default_is_unsolved() {
        assert_eq!(Status::default(), Status::Unsolved);
    }
}
