//! The conic quadratic program data model.

use derive_more::{Display, Error};
use faer::{Col, sparse::SparseColMat};
use problemo::Problem as Problemo;

use crate::cones::ConeDescriptor;
use crate::{E, I};

/// Configuration errors rejected at setup, before any ADMM iteration runs.
#[derive(Debug, Display, Error, PartialEq)]
pub enum ProblemError {
    #[display("P must be square with {n} rows/cols, got {rows}x{cols}")]
    PNotSquare { n: usize, rows: usize, cols: usize },

    #[display("dimension mismatch: q has {q_len} rows but P has {n} columns")]
    QDimMismatch { q_len: usize, n: usize },

    #[display("dimension mismatch: A has {a_cols} columns but P has {n} columns")]
    AColsMismatch { a_cols: usize, n: usize },

    #[display("dimension mismatch: b has {b_len} rows but A has {m} rows")]
    BDimMismatch { b_len: usize, m: usize },

    #[display("cone dimensions sum to {cone_total} but A has {m} rows")]
    ConeDimMismatch { cone_total: usize, m: usize },

    #[display("at least one cone must be specified")]
    NoCones,

    #[display(
        "cone ranges do not partition 0..{m}: expected the sorted ranges to tile it exactly, \
         found a gap or overlap at row {row}"
    )]
    ConesNotAPartition { row: usize, m: usize },
}

/// A conic quadratic program in the standard ADMM form:
///
/// ```text
/// minimize   (1/2) x^T P x + q^T x
/// subject to  A x + s = b,  s in K = K_1 x ... x K_k
/// ```
#[allow(non_snake_case)]
pub struct Problem {
    pub(crate) P: SparseColMat<I, E>,
    pub(crate) q: Col<E>,
    pub(crate) A: SparseColMat<I, E>,
    pub(crate) b: Col<E>,
    pub(crate) cones: Vec<ConeDescriptor>,
}

#[allow(non_snake_case)]
impl Problem {
    /// Builds a new problem, validating all cross-matrix dimensions and that
    /// the cone index ranges exactly partition `1..=m`.
    pub fn new(
        P: SparseColMat<I, E>,
        q: Col<E>,
        A: SparseColMat<I, E>,
        b: Col<E>,
        cones: Vec<ConeDescriptor>,
    ) -> Result<Self, Problemo> {
        let n = P.ncols();
        if P.nrows() != n {
            return Err(ProblemError::PNotSquare {
                n,
                rows: P.nrows(),
                cols: P.ncols(),
            }
            .into());
        }
        if q.nrows() != n {
            return Err(ProblemError::QDimMismatch { q_len: q.nrows(), n }.into());
        }
        if A.ncols() != n {
            return Err(ProblemError::AColsMismatch {
                a_cols: A.ncols(),
                n,
            }
            .into());
        }
        let m = A.nrows();
        if b.nrows() != m {
            return Err(ProblemError::BDimMismatch { b_len: b.nrows(), m }.into());
        }
        if cones.is_empty() {
            return Err(ProblemError::NoCones.into());
        }
        let cone_total: usize = cones.iter().map(|c| c.len()).sum();
        if cone_total != m {
            return Err(ProblemError::ConeDimMismatch { cone_total, m }.into());
        }

        let mut sorted_ranges: Vec<_> = cones.iter().map(|c| c.range.clone()).collect();
        sorted_ranges.sort_by_key(|r| r.start);
        let mut expected_start = 0usize;
        for range in &sorted_ranges {
            if range.start != expected_start {
                return Err(ProblemError::ConesNotAPartition {
                    row: expected_start,
                    m,
                }
                .into());
            }
            expected_start = range.end;
        }
        if expected_start != m {
            return Err(ProblemError::ConesNotAPartition {
                row: expected_start,
                m,
            }
            .into());
        }

        Ok(Self { P, q, A, b, cones })
    }

    pub fn n(&self) -> usize {
        self.q.nrows()
    }

    pub fn m(&self) -> usize {
        self.b.nrows()
    }

    pub fn P(&self) -> &SparseColMat<I, E> {
        &self.P
    }

    pub fn q(&self) -> &Col<E> {
        &self.q
    }

    pub fn A(&self) -> &SparseColMat<I, E> {
        &self.A
    }

    pub fn b(&self) -> &Col<E> {
        &self.b
    }

    pub fn cones(&self) -> &[ConeDescriptor] {
        &self.cones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cones::{Cone, ConeDescriptor};

    fn col(v: &[E]) -> Col<E> {
        Col::from_fn(v.len(), |i| v[i])
    }

    #[test]
    fn contiguous_partition_is_accepted() {
        let p = SparseColMat::try_new_from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
        let a = SparseColMat::try_new_from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
        let cones = vec![
            ConeDescriptor::new(Cone::Zero { dim: 1 }, 0),
            ConeDescriptor::new(Cone::Nonnegative { dim: 1 }, 1),
        ];
        assert!(Problem::new(p, col(&[0.0, 0.0]), a, col(&[0.0, 0.0]), cones).is_ok());
    }

    /// `Nonnegative{2}` at `0` (covers `0..2`) and `Nonnegative{1}` at `1`
    /// (covers `1..2`) overlap at row 1, but their lengths still sum to
    /// `m = 3`: the old `cone_total == m` check alone accepted this, even
    /// though the ranges do not tile `0..3`.
    #[test]
    fn overlapping_ranges_that_sum_correctly_are_rejected() {
        let p = SparseColMat::try_new_from_triplets(3, 3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)])
            .unwrap();
        let a = SparseColMat::try_new_from_triplets(3, 3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)])
            .unwrap();
        let cones = vec![
            ConeDescriptor::new(Cone::Nonnegative { dim: 2 }, 0),
            ConeDescriptor::new(Cone::Nonnegative { dim: 1 }, 1),
        ];
        let result = Problem::new(
            p,
            col(&[0.0, 0.0, 0.0]),
            a,
            col(&[0.0, 0.0, 0.0]),
            cones,
        );
        assert!(result.is_err());
    }
}
