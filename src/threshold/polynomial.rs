//! Polynomial evaluation shared by splitting and its tests.

use super::gf256::GF256;

/// Evaluates `c[0] + c[1]*x + ... + c[k-1]*x^(k-1)` with Horner's rule.
///
/// An empty coefficient list is the zero polynomial.
#[inline(always)]
pub(crate) fn evaluate_polynomial(coeffs: &[GF256], x: GF256) -> GF256 {
    coeffs
        .iter()
        .rev()
        .fold(GF256::ZERO, |acc, &coeff| acc * x + coeff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_polynomial() {
        // f(x) = 1 + 2x
        let coeffs = [GF256(1), GF256(2)];
        assert_eq!(evaluate_polynomial(&coeffs, GF256(1)), GF256(3));
        assert_eq!(evaluate_polynomial(&coeffs, GF256(2)), GF256(5));
        assert_eq!(evaluate_polynomial(&coeffs, GF256(3)), GF256(7));
    }

    #[test]
    fn test_intercept_at_zero() {
        let coeffs = [GF256(0x42), GF256(0x10), GF256(0x99)];
        assert_eq!(evaluate_polynomial(&coeffs, GF256::ZERO), GF256(0x42));
        assert_eq!(evaluate_polynomial(&[], GF256(7)), GF256::ZERO);
    }
}
