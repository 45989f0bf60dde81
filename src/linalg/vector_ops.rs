//! Elementwise column-vector helpers built on `faer`'s `zip!`/`unzip!`
//! macros, shared by the residual and KKT-update code paths.

use faer::{Col, ColRef, unzip, zip};

use crate::E;

pub(crate) fn cwise_multiply<'a>(x1: ColRef<'a, E>, x2: ColRef<'a, E>) -> Col<E> {
    let mut out = Col::<E>::zeros(x1.nrows());
    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 * *x2);
    out
}

pub(crate) fn cwise_quotient<'a>(x1: ColRef<'a, E>, x2: ColRef<'a, E>) -> Col<E> {
    let mut out = Col::<E>::zeros(x1.nrows());
    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 / *x2);
    out
}

pub(crate) fn cwise_inverse<'a>(x: ColRef<'a, E>) -> Col<E> {
    let mut out = Col::<E>::zeros(x.nrows());
    zip!(x, out.as_mut()).for_each(|unzip!(x, out)| *out = 1.0 / *x);
    out
}

pub(crate) fn is_col_positive<'a>(x: ColRef<'a, E>) -> bool {
    let mut res = true;
    zip!(x).for_each(|unzip!(x)| {
        if *x <= 0.0 {
            res = false;
        }
    });
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cwise_quotient() {
        let x1 = Col::from_fn(3, |i| [1.0, 2.0, 3.0][i]);
        let x2 = Col::from_fn(3, |i| [4.0, 5.0, 6.0][i]);
        let result = cwise_quotient(x1.as_ref(), x2.as_ref());
        let expected = Col::from_fn(3, |i| [0.25, 0.4, 0.5][i]);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_is_col_positive() {
        let x1 = Col::from_fn(3, |i| [1.0, 2.0, 3.0][i]);
        let x2 = Col::from_fn(3, |i| [1.0, -2.0, 3.0][i]);
        assert!(is_col_positive(x1.as_ref()));
        assert!(!is_col_positive(x2.as_ref()));
    }
}
