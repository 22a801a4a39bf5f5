//! GF(2^8) arithmetic for threshold sharing.
//!
//! Field elements are bytes; the field is defined by the irreducible polynomial
//! x^8 + x^4 + x^3 + x + 1 (0x11B). Multiplication is bit-serial with mask-based
//! conditionals so the running time does not depend on the secret bytes being
//! shared.

use core::ops::{Add, AddAssign, Mul, MulAssign};

use zeroize::Zeroize;

/// Full irreducible polynomial (x^8 + x^4 + x^3 + x + 1).
const POLY: u16 = 0x11B;

/// A GF(2^8) element.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Zeroize)]
#[repr(transparent)]
pub struct GF256(pub u8);

impl From<u8> for GF256 {
    #[inline(always)]
    fn from(value: u8) -> Self {
        GF256(value)
    }
}

impl From<GF256> for u8 {
    #[inline(always)]
    fn from(element: GF256) -> u8 {
        element.0
    }
}

/// Addition is XOR; the field has characteristic 2, so it is also subtraction.
impl Add for GF256 {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        GF256(self.0 ^ rhs.0)
    }
}

impl AddAssign for GF256 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul for GF256 {
    type Output = Self;

    /// Shift-and-add multiplication reduced modulo 0x11B. Always eight rounds.
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        let mut result: u8 = 0;
        let mut a: u16 = self.0 as u16;
        let mut b: u8 = rhs.0;

        for _ in 0..8 {
            let add_mask = (b & 1).wrapping_mul(0xFF) as u16;
            result ^= (a & add_mask) as u8;

            let carry_mask = ((a >> 7) & 1).wrapping_mul(0xFFFF);
            a = ((a << 1) & 0xFF) ^ ((POLY & 0xFF) & carry_mask);

            b >>= 1;
        }

        GF256(result)
    }
}

impl MulAssign for GF256 {
    #[inline(always)]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl GF256 {
    pub const ZERO: GF256 = GF256(0);
    pub const ONE: GF256 = GF256(1);

    /// Multiplicative inverse via a^254. Zero maps to zero.
    #[inline(always)]
    pub fn inv(self) -> Self {
        let mut result = GF256::ONE;
        let mut base = self;
        let mut exp: u8 = 0xFE;

        for _ in 0..8 {
            let mask = (exp & 1).wrapping_mul(0xFF);
            let factor = GF256((base.0 & mask) | (1 & !mask));
            result *= factor;
            base *= base;
            exp >>= 1;
        }

        result
    }

    /// `self / rhs`, or `None` when dividing by zero.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            None
        } else {
            Some(self * rhs.inv())
        }
    }
}
