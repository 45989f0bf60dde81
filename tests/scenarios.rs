//! End-to-end scenarios exercising the full setup -> solve pipeline.

use faer::sparse::SparseColMat;
use faer::Col;

use qcone::callback::NoOpCallback;
use qcone::cones::{Cone, ConeDescriptor};
use qcone::terminators::NoOpTerminator;
use qcone::{AdmmSolver, Problem, Settings, Status};

fn col(v: &[f64]) -> Col<f64> {
    Col::from_fn(v.len(), |i| v[i])
}

/// S1: `P = I2, q = [-1, -1]`, `A = I2`, `b = [1, 1]`, `s in Box([0,0],[1,1])`.
/// Optimal `x ~= [1, 1]`, status Solved.
#[test]
fn box_qp_converges_to_upper_corner() {
    let p = SparseColMat::try_new_from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
    let a = SparseColMat::try_new_from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
    let q = col(&[-1.0, -1.0]);
    let b = col(&[1.0, 1.0]);
    let l = col(&[0.0, 0.0]);
    let u = col(&[1.0, 1.0]);
    let cones = vec![ConeDescriptor::new_box(l, u, 0)];

    let problem = Problem::new(p, q, a, b, cones).expect("well-formed problem");
    let mut solver = AdmmSolver::new(problem, Settings::default()).expect("valid settings");
    let result = solver
        .solve(&mut NoOpCallback, &mut NoOpTerminator)
        .expect("solve does not hit a hard error");

    assert_eq!(result.status, Status::Solved);
    assert!((result.x[0] - 1.0).abs() < 1e-2);
    assert!((result.x[1] - 1.0).abs() < 1e-2);
}

/// Equality-constrained QP: `minimize (1/2) x^2 - x` subject to `x = 0.5`
/// (a `Zero` cone row). The equality multiplier is uniquely determined by
/// stationarity: `P x + q + A^T nu = 0` => `nu = -(P x + q) = 0.5`. Exercises
/// testable properties 3 and 4 (the scaling round-trip on `nu`), which the
/// earlier `nu = Col::zeros(m)` placeholder in `AdmmSolver::solve` defeated
/// silently -- every scenario until now left `result.nu` unchecked.
#[test]
fn equality_constrained_qp_recovers_nonzero_nu() {
    let p = SparseColMat::try_new_from_triplets(1, 1, &[(0, 0, 1.0)]).unwrap();
    let a = SparseColMat::try_new_from_triplets(1, 1, &[(0, 0, 1.0)]).unwrap();
    let q = col(&[-1.0]);
    let b = col(&[0.5]);
    let cones = vec![ConeDescriptor::new(Cone::Zero { dim: 1 }, 0)];

    let problem = Problem::new(p, q, a, b, cones).expect("well-formed problem");
    let mut solver = AdmmSolver::new(problem, Settings::default()).expect("valid settings");
    let result = solver
        .solve(&mut NoOpCallback, &mut NoOpTerminator)
        .expect("solve does not hit a hard error");

    assert_eq!(result.status, Status::Solved);
    assert!((result.x[0] - 0.5).abs() < 1e-2);
    assert!(result.nu[0].abs() > 1e-3, "nu must not collapse to zero");
    assert!((result.nu[0] - 0.5).abs() < 1e-2);
}

/// S2: `x <= -1` and `x >= 0` simultaneously -- primal infeasible.
#[test]
fn conflicting_nonnegative_rows_are_primal_infeasible() {
    let p = SparseColMat::try_new_from_triplets(1, 1, &[] as &[(usize, usize, f64)]).unwrap();
    let a = SparseColMat::try_new_from_triplets(2, 1, &[(0, 0, 1.0), (1, 0, -1.0)]).unwrap();
    let q = col(&[1.0]);
    let b = col(&[-1.0, 0.0]);
    let cones = vec![ConeDescriptor::new(Cone::Nonnegative { dim: 2 }, 0)];

    let problem = Problem::new(p, q, a, b, cones).expect("well-formed problem");
    let mut settings = Settings::default();
    settings.check_infeasibility = 10;
    let mut solver = AdmmSolver::new(problem, settings).expect("valid settings");
    let result = solver
        .solve(&mut NoOpCallback, &mut NoOpTerminator)
        .expect("solve does not hit a hard error");

    assert_eq!(result.status, Status::PrimalInfeasible);
}

/// S3: minimize `x^T x` subject to `(t, x) in SOC^3` and `t = 1`.
/// Optimal `x = 0, t = 1`, status Solved.
#[test]
fn soc_projection_recovers_zero_vector_at_fixed_t() {
    let p = SparseColMat::try_new_from_triplets(3, 3, &[(1, 1, 2.0), (2, 2, 2.0)]).unwrap();
    let q = col(&[0.0, 0.0, 0.0]);
    let a = SparseColMat::try_new_from_triplets(
        4,
        3,
        &[(0, 0, 1.0), (1, 0, -1.0), (2, 1, -1.0), (3, 2, -1.0)],
    )
    .unwrap();
    let b = col(&[1.0, 0.0, 0.0, 0.0]);
    let cones = vec![
        ConeDescriptor::new(Cone::Zero { dim: 1 }, 0),
        ConeDescriptor::new(Cone::SecondOrder { dim: 3 }, 1),
    ];

    let problem = Problem::new(p, q, a, b, cones).expect("well-formed problem");
    let mut solver = AdmmSolver::new(problem, Settings::default()).expect("valid settings");
    let result = solver
        .solve(&mut NoOpCallback, &mut NoOpTerminator)
        .expect("solve does not hit a hard error");

    assert_eq!(result.status, Status::Solved);
    assert!((result.x[0] - 1.0).abs() < 1e-2);
    assert!(result.x[1].abs() < 1e-2);
    assert!(result.x[2].abs() < 1e-2);
}
