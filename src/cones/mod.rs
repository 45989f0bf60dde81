//! Projection onto each supported cone variant, and the flat composite-cone
//! traversal used by the ADMM loop.
//!
//! Cones are expressed as a tagged sum type rather than as trait objects: the
//! hot path (one projection per iteration per cone) never needs a virtual
//! call, and the composite projection is a flat loop over cone slices.

pub mod exp;
pub mod linear;
pub mod power;
pub mod psd;
pub mod soc;

use std::ops::Range;

use faer::Col;

use crate::E;

/// A single cone in the Cartesian product `K = K_1 x ... x K_k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cone {
    /// `{0}^dim` -- used for equality constraints.
    Zero { dim: usize },
    /// `R_+^dim`.
    Nonnegative { dim: usize },
    /// `[l, u]` componentwise, `dim` entries each.
    Box { dim: usize },
    /// The second-order (Lorentz) cone of total dimension `dim` (`dim - 1`
    /// vector components plus the leading scalar).
    SecondOrder { dim: usize },
    /// The PSD cone on `n x n` matrices in full (unpacked) column-major form,
    /// `dim = n * n`.
    Psd { n: usize },
    /// The PSD cone on `n x n` matrices in scaled upper-triangular packed
    /// form, `dim = n * (n + 1) / 2`.
    PsdTriangle { n: usize },
    /// The 3-dimensional primal exponential cone.
    Exponential,
    /// The 3-dimensional dual exponential cone.
    DualExponential,
    /// The 3-dimensional primal power cone with exponent `alpha in (0, 1)`.
    Power { alpha: E },
    /// The 3-dimensional dual power cone with exponent `alpha in (0, 1)`.
    DualPower { alpha: E },
}

impl Cone {
    /// Ambient dimension of this cone (number of rows of `s` it occupies).
    pub fn dim(&self) -> usize {
        match self {
            Cone::Zero { dim } => *dim,
            Cone::Nonnegative { dim } => *dim,
            Cone::Box { dim } => *dim,
            Cone::SecondOrder { dim } => *dim,
            Cone::Psd { n } => n * n,
            Cone::PsdTriangle { n } => n * (n + 1) / 2,
            Cone::Exponential | Cone::DualExponential => 3,
            Cone::Power { .. } | Cone::DualPower { .. } => 3,
        }
    }

    /// `true` if the cone requires a single repeated scalar on its block of
    /// the `E` scaling diagonal (SOC, PSD, exponential, power). `Zero`,
    /// `Nonnegative`, and `Box` accept elementwise scaling.
    pub fn requires_scalar_scaling(&self) -> bool {
        matches!(
            self,
            Cone::SecondOrder { .. }
                | Cone::Psd { .. }
                | Cone::PsdTriangle { .. }
                | Cone::Exponential
                | Cone::DualExponential
                | Cone::Power { .. }
                | Cone::DualPower { .. }
        )
    }

    /// Orthogonally projects `v` onto this cone, in place. Idempotent.
    pub fn project(&self, v: &mut [E]) {
        match self {
            Cone::Zero { .. } => linear::project_zero(v),
            Cone::Nonnegative { .. } => linear::project_nonnegative(v),
            Cone::Box { .. } => {
                panic!("Cone::Box has no bounds of its own; project via ConeDescriptor")
            }
            Cone::SecondOrder { .. } => soc::project(v),
            Cone::Psd { n } => psd::project_full(v, *n),
            Cone::PsdTriangle { n } => psd::project_triangle(v, *n),
            Cone::Exponential => exp::project_primal(v),
            Cone::DualExponential => exp::project_dual(v),
            Cone::Power { alpha } => power::project_primal(v, *alpha),
            Cone::DualPower { alpha } => power::project_dual(v, *alpha),
        }
    }

    /// `true` if `y` lies in the dual cone `K*` (used for infeasibility
    /// certificates on `delta_y`).
    pub fn in_dual(&self, y: &[E], tol: E) -> bool {
        match self {
            Cone::Zero { .. } => true, // dual of {0} is all of R^dim
            Cone::Nonnegative { .. } => linear::is_nonnegative(y, tol),
            Cone::Box { .. } => true, // dual of a box is unbounded in general; handled by caller
            Cone::SecondOrder { .. } => soc::in_cone(y, tol),
            Cone::Psd { n } => psd::in_psd_full(y, *n, tol),
            Cone::PsdTriangle { n } => psd::in_psd_triangle(y, *n, tol),
            Cone::Exponential => exp::in_dual(y, tol),
            Cone::DualExponential => exp::in_primal(y, tol),
            Cone::Power { alpha } => power::in_dual(y, *alpha, tol),
            Cone::DualPower { alpha } => power::in_primal(y, *alpha, tol),
        }
    }

    /// `true` if `x` lies in the recession cone of `K*` -- for the cones
    /// supported here this coincides with `K*` itself, since every supported
    /// cone is conic (closed under nonnegative scaling).
    pub fn in_recc(&self, x: &[E], tol: E) -> bool {
        self.in_dual(x, tol)
    }
}

/// A cone together with its slice `[lo, hi)` into the overall `s` vector, and
/// (for box cones only) its bounds.
#[derive(Debug, Clone)]
pub struct ConeDescriptor {
    pub cone: Cone,
    pub range: Range<usize>,
    /// Lower/upper bounds, populated only for `Cone::Box`.
    pub bounds: Option<(Col<E>, Col<E>)>,
}

impl ConeDescriptor {
    pub fn new(cone: Cone, start: usize) -> Self {
        let dim = cone.dim();
        Self {
            range: start..start + dim,
            cone,
            bounds: None,
        }
    }

    pub fn new_box(l: Col<E>, u: Col<E>, start: usize) -> Self {
        let dim = l.nrows();
        Self {
            range: start..start + dim,
            cone: Cone::Box { dim },
            bounds: Some((l, u)),
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    fn project(&self, v: &mut [E]) {
        match &self.cone {
            Cone::Box { .. } => {
                let (l, u) = self.bounds.as_ref().expect("box cone missing bounds");
                linear::project_box(v, l.as_slice(), u.as_slice());
            }
            _ => self.cone.project(v),
        }
    }

    fn in_dual(&self, y: &[E], tol: E) -> bool {
        match &self.cone {
            Cone::Box { .. } => true,
            _ => self.cone.in_dual(y, tol),
        }
    }

    fn in_recc(&self, x: &[E], tol: E) -> bool {
        match &self.cone {
            Cone::Box { .. } => linear::is_zero(x, tol),
            _ => self.cone.in_recc(x, tol),
        }
    }
}

/// The Cartesian product `K = K_1 x ... x K_k`, traversed as a flat list of
/// slices during projection.
pub struct CompositeCone {
    descriptors: Vec<ConeDescriptor>,
}

impl CompositeCone {
    pub fn new(descriptors: Vec<ConeDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[ConeDescriptor] {
        &self.descriptors
    }

    pub fn dim(&self) -> usize {
        self.descriptors.iter().map(|d| d.len()).sum()
    }

    /// Projects every cone block of `v` onto its cone, in place.
    pub fn project(&self, v: &mut Col<E>) {
        let slice = v.as_slice_mut();
        for d in &self.descriptors {
            self.project_range(slice, d);
        }
    }

    fn project_range(&self, slice: &mut [E], d: &ConeDescriptor) {
        d.project(&mut slice[d.range.clone()]);
    }

    /// `true` if every block of `y` lies in the corresponding dual cone.
    pub fn in_dual(&self, y: &Col<E>, tol: E) -> bool {
        let slice = y.as_slice();
        self.descriptors
            .iter()
            .all(|d| d.in_dual(&slice[d.range.clone()], tol))
    }

    /// `true` if every block of `x` lies in the recession cone of the
    /// corresponding dual cone.
    pub fn in_recc(&self, x: &Col<E>, tol: E) -> bool {
        let slice = x.as_slice();
        self.descriptors
            .iter()
            .all(|d| d.in_recc(&slice[d.range.clone()], tol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(v: &[E]) -> Col<E> {
        Col::from_fn(v.len(), |i| v[i])
    }

    #[test]
    fn zero_cone_projects_to_origin() {
        let mut v = col(&[1.0, -2.0, 3.0]);
        Cone::Zero { dim: 3 }.project(v.as_slice_mut());
        assert_eq!(v.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn nonneg_cone_clips_at_zero() {
        let mut v = col(&[1.0, -2.0, 0.0]);
        Cone::Nonnegative { dim: 3 }.project(v.as_slice_mut());
        assert_eq!(v.as_slice(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn box_cone_clamps() {
        let mut v = col(&[-1.0, 0.5, 2.0]);
        let l = col(&[0.0, 0.0, 0.0]);
        let u = col(&[1.0, 1.0, 1.0]);
        linear::project_box(v.as_slice_mut(), l.as_slice(), u.as_slice());
        assert_eq!(v.as_slice(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn composite_cone_traverses_each_block() {
        let descriptors = vec![
            ConeDescriptor::new(Cone::Zero { dim: 1 }, 0),
            ConeDescriptor::new(Cone::Nonnegative { dim: 2 }, 1),
        ];
        let composite = CompositeCone::new(descriptors);
        let mut v = col(&[5.0, -1.0, 2.0]);
        composite.project(&mut v);
        assert_eq!(v.as_slice(), &[0.0, 0.0, 2.0]);
    }

    #[test]
    fn projection_is_idempotent_for_linear_cones() {
        let cases: Vec<(Cone, Vec<E>)> = vec![
            (Cone::Zero { dim: 3 }, vec![1.0, -2.0, 3.0]),
            (Cone::Nonnegative { dim: 3 }, vec![1.0, -2.0, 3.0]),
        ];
        for (cone, data) in cases {
            let mut v = data.clone();
            cone.project(&mut v);
            let once = v.clone();
            cone.project(&mut v);
            assert_eq!(v, once);
        }
    }
}
