//! The second-order (Lorentz / ice-cream) cone.
//!
//! `SOC^d = { (t, x) in R x R^{d-1} : ||x||_2 <= t }`. The cone is
//! self-dual, so `in_cone` doubles as the dual-membership test.

use crate::E;

fn norm(x: &[E]) -> E {
    x.iter().map(|v| v * v).sum::<E>().sqrt()
}

/// Orthogonal projection onto `SOC^d`, in place. Three cases: already
/// feasible (`norm_x <= t`), in the polar of the cone (`norm_x <= -t`, so the
/// projection is the origin), or interior scaling.
pub fn project(v: &mut [E]) {
    assert!(!v.is_empty());
    let t = v[0];
    let norm_x = norm(&v[1..]);

    if norm_x <= t {
        return;
    }
    if norm_x <= -t {
        v.fill(0.0);
        return;
    }

    let t_new = (norm_x + t) / 2.0;
    let scale = t_new / norm_x;
    v[0] = t_new;
    for x in v[1..].iter_mut() {
        *x *= scale;
    }
}

pub fn in_cone(v: &[E], tol: E) -> bool {
    if v.is_empty() {
        return true;
    }
    norm(&v[1..]) <= v[0] + tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feasible_point_is_fixed() {
        let mut v = vec![2.0, 1.0, 1.0];
        let before = v.clone();
        project(&mut v);
        assert_eq!(v, before);
    }

    #[test]
    fn polar_point_maps_to_origin() {
        let mut v = vec![-2.0, 1.0, 1.0];
        project(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn interior_point_is_scaled_onto_boundary() {
        let mut v = vec![0.0, 3.0, 4.0];
        project(&mut v);
        assert!(in_cone(&v, 1e-10));
        let t = v[0];
        let norm_x = norm(&v[1..]);
        assert!((t - norm_x).abs() < 1e-10);
    }

    #[test]
    fn projection_is_idempotent() {
        let mut v = vec![0.0, 3.0, 4.0];
        project(&mut v);
        let once = v.clone();
        project(&mut v);
        for (a, b) in v.iter().zip(once.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
