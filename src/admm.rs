//! The ADMM solve loop: settings, the result record, and the orchestrator
//! that ties the scaler, KKT assembler, cone projections, and residual
//! checks together.

use std::time::Instant;

use derive_more::{Display, Error};
use faer::sparse::SparseColMat;
use faer::Col;
use problemo::Problem;

use crate::callback::Callback;
use crate::cones::{Cone, CompositeCone};
use crate::kkt::KktSystem;
use crate::linalg::cholesky::SimplicialSparseCholesky;
use crate::linalg::solver::LinearSolver;
use crate::problem::Problem as QpProblem;
use crate::residuals::{self, InfeasibilityCertificate};
use crate::scaling::{self, ScaleMatrices, ScalingSettings};
use crate::terminators::Terminator;
use crate::{Status, E};

/// Multiplier applied to `rho` on rows belonging to a `Zero` (equality) cone,
/// so equality constraints are enforced more strictly than inequalities.
const EQUALITY_RHO_SCALE: E = 1e3;

#[derive(Debug, Display, Error, PartialEq)]
pub enum SettingsError {
    #[display("alpha must be in (0, 2), got {alpha}")]
    AlphaOutOfRange { alpha: E },

    #[display("sigma must be positive, got {sigma}")]
    NonPositiveSigma { sigma: E },

    #[display("rho must be positive, got {rho}")]
    NonPositiveRho { rho: E },
}

/// Tunable knobs for the ADMM loop, mirroring the reference solver's
/// settings surface.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    pub max_iter: usize,
    pub eps_abs: E,
    pub eps_rel: E,
    pub alpha: E,
    pub sigma: E,
    pub rho: E,
    pub adaptive_rho: bool,
    pub adaptive_rho_interval: usize,
    pub check_termination: usize,
    pub check_infeasibility: usize,
    pub scaling_iters: usize,
    pub min_scaling: E,
    pub max_scaling: E,
    pub timelimit: E,
    pub verbose: bool,
    pub decompose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_iter: 2500,
            eps_abs: 1e-4,
            eps_rel: 1e-4,
            alpha: 1.6,
            sigma: 1e-6,
            rho: 0.1,
            adaptive_rho: true,
            adaptive_rho_interval: 40,
            check_termination: 40,
            check_infeasibility: 40,
            scaling_iters: 10,
            min_scaling: 1e-4,
            max_scaling: 1e4,
            timelimit: 0.0,
            verbose: false,
            decompose: true,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Problem> {
        if !(self.alpha > 0.0 && self.alpha < 2.0) {
            return Err(SettingsError::AlphaOutOfRange { alpha: self.alpha }.into());
        }
        if self.sigma <= 0.0 {
            return Err(SettingsError::NonPositiveSigma { sigma: self.sigma }.into());
        }
        if self.rho <= 0.0 {
            return Err(SettingsError::NonPositiveRho { rho: self.rho }.into());
        }
        Ok(())
    }

    fn scaling_settings(&self) -> ScalingSettings {
        ScalingSettings {
            iters: self.scaling_iters,
            min_scaling: self.min_scaling,
            max_scaling: self.max_scaling,
        }
    }
}

/// The outcome of a solve: the primal/dual iterate, the terminal status,
/// and timing/diagnostic fields.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub x: Col<E>,
    pub s: Col<E>,
    pub nu: Col<E>,
    pub mu: Col<E>,
    pub cost: E,
    pub iter: usize,
    pub status: Status,
    pub run_time: E,
    pub setup_time: E,
    pub iter_time: E,
    pub r_prim: E,
    pub r_dual: E,
}

/// Owns the problem, scale matrices, iterate, penalty, and KKT handle for
/// one solve. Not reused across solves.
#[allow(non_snake_case)]
pub struct AdmmSolver {
    P: SparseColMat<crate::I, E>,
    q: Col<E>,
    A: SparseColMat<crate::I, E>,
    b: Col<E>,
    cones: CompositeCone,
    settings: Settings,
    scale: ScaleMatrices,
    kkt: KktSystem<SimplicialSparseCholesky>,
    rho: Col<E>,
    /// Per-row multiplier applied on top of the scalar `rho` (1.0 normally,
    /// `EQUALITY_RHO_SCALE` on `Zero`-cone rows), preserved across
    /// adaptive-rho updates.
    rho_scale: Col<E>,
}

impl AdmmSolver {
    #[allow(non_snake_case)]
    pub fn new(problem: QpProblem, settings: Settings) -> Result<Self, Problem> {
        settings.validate()?;

        let mut P = problem.P().clone();
        let mut q = problem.q().clone();
        let mut A = problem.A().clone();
        let mut b = problem.b().clone();
        let descriptors = problem.cones().to_vec();

        let scale = scaling::equilibrate(
            &mut P,
            &mut q,
            &mut A,
            &mut b,
            &descriptors,
            settings.scaling_settings(),
        );

        let m = b.nrows();
        let mut rho_scale = Col::<E>::from_fn(m, |_| 1.0);
        for d in &descriptors {
            if matches!(d.cone, Cone::Zero { .. }) {
                for i in d.range.clone() {
                    rho_scale[i] = EQUALITY_RHO_SCALE;
                }
            }
        }
        let rho = Col::from_fn(m, |i| settings.rho * rho_scale[i]);
        let kkt = KktSystem::new(&P, &A, settings.sigma, &rho)?;
        let cones = CompositeCone::new(descriptors);

        Ok(Self {
            P,
            q,
            A,
            b,
            cones,
            settings,
            scale,
            kkt,
            rho,
            rho_scale,
        })
    }

    /// Runs the ADMM loop to completion, reporting progress through
    /// `callback` and checking `terminator` at iteration boundaries.
    pub fn solve(
        &mut self,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
    ) -> Result<SolveResult, Problem> {
        let setup_start = Instant::now();
        let n = self.q.nrows();
        let m = self.b.nrows();

        let mut x = Col::<E>::zeros(n);
        let mut s = Col::<E>::zeros(m);
        let mut mu = Col::<E>::zeros(m);
        let mut nu = Col::<E>::zeros(m);

        let mut x_prev = x.clone();
        let mut mu_prev = mu.clone();

        let setup_time = setup_start.elapsed().as_secs_f64();
        let run_start = Instant::now();

        terminator.initialize();

        let mut status = Status::Unsolved;
        let mut r_prim = E::INFINITY;
        let mut r_dual = E::INFINITY;
        let mut iter = 0usize;

        'outer: for k in 0..self.settings.max_iter {
            iter = k + 1;

            let mut rhs = Col::<E>::zeros(n + m);
            for i in 0..n {
                rhs[i] = self.settings.sigma * x[i] - self.q[i];
            }
            for i in 0..m {
                rhs[n + i] = self.b[i] - s[i] + mu[i] / self.rho[i];
            }

            let sol = match self.kkt.solve(&rhs) {
                Ok(sol) => sol,
                Err(_) => {
                    status = Status::Unsolved;
                    break 'outer;
                }
            };
            let x_tilde = Col::from_fn(n, |i| sol[i]);
            nu = Col::from_fn(m, |i| sol[n + i]);

            let alpha = self.settings.alpha;
            for i in 0..n {
                x[i] = alpha * x_tilde[i] + (1.0 - alpha) * x[i];
            }

            let mut s_tilde = Col::<E>::zeros(m);
            for i in 0..m {
                s_tilde[i] = s[i] - (nu[i] + mu[i]) / self.rho[i];
                s_tilde[i] = alpha * s_tilde[i] + (1.0 - alpha) * s[i];
            }

            let mut s_new = Col::<E>::zeros(m);
            for i in 0..m {
                s_new[i] = s_tilde[i] + mu[i] / self.rho[i];
            }
            self.cones.project(&mut s_new);

            for i in 0..m {
                mu[i] += self.rho[i] * (s_tilde[i] - s_new[i]);
            }
            s = s_new;

            if (k + 1) % self.settings.check_termination == 0 {
                let residual = residuals::compute(&self.P, &self.q, &self.A, &self.b, &x, &s, &mu);
                r_prim = residual.r_prim;
                r_dual = residual.r_dual;
                let cost = residuals::cost(&self.P, &self.q, &x, self.scale.c_inv);

                callback.call(k + 1, cost, r_prim, r_dual);

                if residual.has_converged(self.settings.eps_abs, self.settings.eps_rel) {
                    status = Status::Solved;
                    break 'outer;
                }
                if cost.abs() > 1e20 {
                    status = Status::Unsolved;
                    break 'outer;
                }
            }

            if self.settings.check_infeasibility > 0 && (k + 1) % self.settings.check_infeasibility == 0 {
                let delta_x = Col::from_fn(n, |i| x[i] - x_prev[i]);
                let delta_y = Col::from_fn(m, |i| -mu[i] + mu_prev[i]);

                match residuals::check_certificates(
                    &self.P, &self.q, &self.A, &self.b, &self.cones, &delta_x, &delta_y, 1e-7,
                ) {
                    InfeasibilityCertificate::Primal => {
                        status = Status::PrimalInfeasible;
                        x.as_slice_mut().iter_mut().for_each(|v| *v = E::NAN);
                        break 'outer;
                    }
                    InfeasibilityCertificate::Dual => {
                        status = Status::DualInfeasible;
                        x.as_slice_mut().iter_mut().for_each(|v| *v = E::NAN);
                        break 'outer;
                    }
                    InfeasibilityCertificate::None => {}
                }

                x_prev = x.clone();
                mu_prev = mu.clone();
            }

            if self.settings.adaptive_rho
                && self.settings.adaptive_rho_interval > 0
                && (k + 1) % self.settings.adaptive_rho_interval == 0
            {
                let residual = residuals::compute(&self.P, &self.q, &self.A, &self.b, &x, &s, &mu);
                if residual.r_dual > 0.0 {
                    let ratio = (residual.r_prim / residual.r_dual).sqrt();
                    let base_rho = self.rho[0] / self.rho_scale[0];
                    let candidate = base_rho * ratio;
                    if candidate > 5.0 * base_rho || candidate < 0.2 * base_rho {
                        self.rho = Col::from_fn(m, |i| (candidate * self.rho_scale[i]).max(1e-8));
                        if self.kkt.update_rho(&self.rho).is_err() {
                            status = Status::Unsolved;
                            break 'outer;
                        }
                    }
                }
            }

            if self.settings.timelimit > 0.0 && run_start.elapsed().as_secs_f64() > self.settings.timelimit
            {
                status = Status::TimeLimitReached;
                break 'outer;
            }

            if let Some(terminal) = terminator.terminate() {
                status = terminal;
                break 'outer;
            }
        }

        if status == Status::Unsolved && iter >= self.settings.max_iter {
            status = Status::MaxIterReached;
        }

        let cost = residuals::cost(&self.P, &self.q, &x, self.scale.c_inv);
        let run_time = run_start.elapsed().as_secs_f64();

        let (x_unscaled, s_unscaled, nu_unscaled, mu_unscaled) =
            self.reverse_scale(&x, &s, &nu, &mu);

        Ok(SolveResult {
            x: x_unscaled,
            s: s_unscaled,
            nu: nu_unscaled,
            mu: mu_unscaled,
            cost,
            iter,
            status,
            run_time,
            setup_time,
            iter_time: if iter > 0 { run_time / iter as E } else { 0.0 },
            r_prim,
            r_dual,
        })
    }

    /// Reverses the Ruiz scaling on the iterate: `x <- D x`, `s <- Einv s`,
    /// `nu <- E nu cinv`, `mu <- E mu cinv`.
    fn reverse_scale(
        &self,
        x: &Col<E>,
        s: &Col<E>,
        nu: &Col<E>,
        mu: &Col<E>,
    ) -> (Col<E>, Col<E>, Col<E>, Col<E>) {
        let n = x.nrows();
        let m = s.nrows();
        let x_out = Col::from_fn(n, |i| self.scale.d[i] * x[i]);
        let s_out = Col::from_fn(m, |i| self.scale.e_inv[i] * s[i]);
        let nu_out = Col::from_fn(m, |i| self.scale.e[i] * nu[i] * self.scale.c_inv);
        let mu_out = Col::from_fn(m, |i| self.scale.e[i] * mu[i] * self.scale.c_inv);
        (x_out, s_out, nu_out, mu_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        let mut settings = Settings::default();
        settings.alpha = 2.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn negative_sigma_is_rejected() {
        let mut settings = Settings::default();
        settings.sigma = -1.0;
        assert!(settings.validate().is_err());
    }
}
