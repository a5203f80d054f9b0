//! Unsigned 256-bit wrapping arithmetic, with the signed variants EVM needs
//! layered on top of the same bit pattern (two's complement).

use ethereum_types::{U256, U512};

/// Unsigned 256-bit integer with wrapping arithmetic.
///
/// A thin newtype over [`U256`] rather than a bare type alias: it lets us
/// pin down wrapping semantics for `+`/`-`/`*` (the `uint`-crate types panic
/// on overflow in debug builds) without relying on callers to remember to
/// use `overflowing_*` everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct W256(pub U256);

impl W256 {
    pub const ZERO: W256 = W256(U256::zero());

    pub fn from_u64(n: u64) -> Self {
        W256(U256::from(n))
    }

    pub fn from_usize(n: usize) -> Self {
        W256(U256::from(n))
    }

    pub fn from_big_endian(bytes: &[u8]) -> Self {
        W256(U256::from_big_endian(bytes))
    }

    pub fn to_big_endian(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// True if the most significant bit is set (two's-complement sign bit).
    pub fn is_negative(self) -> bool {
        self.0.bit(255)
    }

    /// Two's-complement negation: `!x + 1`, wrapping.
    pub fn negate(self) -> Self {
        let (flipped, _) = (!self.0).overflowing_add(U256::one());
        W256(flipped)
    }

    /// Unsigned magnitude of a two's-complement value.
    pub fn abs(self) -> Self {
        if self.is_negative() { self.negate() } else { self }
    }

    pub fn wrapping_add(self, rhs: Self) -> Self {
        W256(self.0.overflowing_add(rhs.0).0)
    }

    pub fn wrapping_sub(self, rhs: Self) -> Self {
        W256(self.0.overflowing_sub(rhs.0).0)
    }

    pub fn wrapping_mul(self, rhs: Self) -> Self {
        W256(self.0.overflowing_mul(rhs.0).0)
    }

    /// Truncating division; EVM convention maps divisor==0 to 0 rather than
    /// trapping.
    pub fn div(self, rhs: Self) -> Self {
        if rhs.is_zero() { W256::ZERO } else { W256(self.0 / rhs.0) }
    }

    /// Remainder; divisor==0 maps to 0.
    pub fn rem(self, rhs: Self) -> Self {
        if rhs.is_zero() { W256::ZERO } else { W256(self.0 % rhs.0) }
    }

    /// Signed division on the two's-complement bit pattern.
    ///
    /// `-2^255 / -1` is the one case where negating the dividend would
    /// overflow back to itself; EVM defines the result as `-2^255` rather
    /// than trapping, which `wrapping_sub`-based negation already produces.
    pub fn sdiv(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return W256::ZERO;
        }
        let neg_min = W256(U256::one() << 255);
        let neg_one = W256::ZERO.wrapping_sub(W256::from_u64(1));
        if self == neg_min && rhs == neg_one {
            return neg_min;
        }
        let result_negative = self.is_negative() != rhs.is_negative();
        let magnitude = self.abs().div(rhs.abs());
        if result_negative { magnitude.negate() } else { magnitude }
    }

    /// Signed remainder; the sign of the result follows the dividend.
    pub fn smod(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return W256::ZERO;
        }
        let magnitude = self.abs().rem(rhs.abs());
        if self.is_negative() { magnitude.negate() } else { magnitude }
    }

    /// `(self + rhs) mod modulus`, computed in a 512-bit intermediate so the
    /// addition can't lose bits. `modulus == 0` maps to 0.
    pub fn addmod(self, rhs: Self, modulus: Self) -> Self {
        if modulus.is_zero() {
            return W256::ZERO;
        }
        let wide = U512::from(self.0) + U512::from(rhs.0);
        let reduced = wide % U512::from(modulus.0);
        W256(u512_to_u256_truncate(reduced))
    }

    /// `(self * rhs) mod modulus`, computed in a 512-bit intermediate.
    /// `modulus == 0` maps to 0.
    pub fn mulmod(self, rhs: Self, modulus: Self) -> Self {
        if modulus.is_zero() {
            return W256::ZERO;
        }
        let wide = U512::from(self.0) * U512::from(rhs.0);
        let reduced = wide % U512::from(modulus.0);
        W256(u512_to_u256_truncate(reduced))
    }

    /// Wrapping fast exponentiation, `self ^ exponent`.
    pub fn pow_wrapping(self, exponent: Self) -> Self {
        let mut base = self;
        let mut exp = exponent.0;
        let mut result = W256::from_u64(1);
        while !exp.is_zero() {
            if exp.bit(0) {
                result = result.wrapping_mul(base);
            }
            base = base.wrapping_mul(base);
            exp >>= 1;
        }
        result
    }

    /// `SIGNEXTEND(byte_index, self)`: sign-extend from the
    /// `(8*byte_index + 7)`-th bit. `byte_index >= 32` is a no-op.
    pub fn signextend(self, byte_index: Self) -> Self {
        if byte_index.0 >= U256::from(32u64) {
            return self;
        }
        let byte_index = u256_to_u64_saturating(byte_index.0);
        let sign_bit_index = byte_index
            .saturating_mul(8)
            .saturating_add(7);
        // byte_index == 31 gives sign_bit_index == 255, the value's own sign
        // bit: already full-width, so sign-extending it is the identity.
        // Computing the mask below would need to shift by 256, which `uint`
        // evaluates to 0 before the following `- 1` underflows and panics.
        if sign_bit_index >= 255 {
            return self;
        }
        let sign_set = self.0.bit(sign_bit_index as usize);
        let mask = (U256::one() << (sign_bit_index + 1)) - U256::one();
        if sign_set {
            W256((self.0 & mask) | !mask)
        } else {
            W256(self.0 & mask)
        }
    }

    /// Boolean comparison result as EVM expects: 1 or 0.
    pub fn from_bool(b: bool) -> Self {
        if b { W256::from_u64(1) } else { W256::ZERO }
    }

    pub fn bitand(self, rhs: Self) -> Self {
        W256(self.0 & rhs.0)
    }

    pub fn bitor(self, rhs: Self) -> Self {
        W256(self.0 | rhs.0)
    }

    pub fn bitxor(self, rhs: Self) -> Self {
        W256(self.0 ^ rhs.0)
    }

    pub fn bitnot(self) -> Self {
        W256(!self.0)
    }

    /// `BYTE(n, self)`: the byte at position `n` counted from the most
    /// significant end. `n >= 32` yields 0.
    pub fn byte(self, n: Self) -> Self {
        if n.0 >= U256::from(32u64) {
            return W256::ZERO;
        }
        let idx = u256_to_u64_saturating(n.0) as usize;
        let be = self.to_big_endian();
        let value = be.get(idx).copied().unwrap_or(0);
        W256::from_u64(u64::from(value))
    }

    pub fn shl(self, shift: Self) -> Self {
        if shift.0 >= U256::from(256u64) {
            return W256::ZERO;
        }
        W256(self.0 << u256_to_u64_saturating(shift.0))
    }

    pub fn shr(self, shift: Self) -> Self {
        if shift.0 >= U256::from(256u64) {
            return W256::ZERO;
        }
        W256(self.0 >> u256_to_u64_saturating(shift.0))
    }

    /// Arithmetic shift right, sign-extending with 1s when `self` is
    /// negative. A shift of 256 or more collapses to all-1s or all-0s.
    pub fn sar(self, shift: Self) -> Self {
        let negative = self.is_negative();
        if shift.0 >= U256::from(256u64) {
            return if negative { W256::ZERO.negate() } else { W256::ZERO };
        }
        let shift = u256_to_u64_saturating(shift.0);
        if !negative {
            return W256(self.0 >> shift);
        }
        let shifted = self.0 >> shift;
        let fill = if shift == 0 { U256::zero() } else { (!U256::zero()) << (256 - shift) };
        W256(shifted | fill)
    }

    pub fn checked_usize(self) -> Option<usize> {
        if self.0 > U256::from(usize::MAX) {
            None
        } else {
            Some(u256_to_u64_saturating(self.0) as usize)
        }
    }
}

fn u256_to_u64_saturating(v: U256) -> u64 {
    if v > U256::from(u64::MAX) { u64::MAX } else { v.low_u64() }
}

fn u512_to_u256_truncate(v: U512) -> U256 {
    let mut bytes = [0u8; 64];
    v.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

impl From<U256> for W256 {
    fn from(v: U256) -> Self {
        W256(v)
    }
}

impl From<W256> for U256 {
    fn from(v: W256) -> Self {
        v.0
    }
}

impl From<u64> for W256 {
    fn from(v: u64) -> Self {
        W256::from_u64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdiv_matches_division_identity() {
        let a = W256::from_u64(17).negate();
        let b = W256::from_u64(5);
        let q = a.sdiv(b);
        let r = a.smod(b);
        assert_eq!(q.wrapping_mul(b).wrapping_add(r), a);
    }

    fn min_i256() -> W256 {
        W256(U256::one() << 255)
    }

    #[test]
    fn sdiv_min_by_neg_one_does_not_overflow() {
        let min = min_i256();
        let neg_one = W256::ZERO.wrapping_sub(W256::from_u64(1));
        assert_eq!(min.sdiv(neg_one), min);
    }

    #[test]
    fn div_by_zero_is_zero() {
        assert_eq!(W256::from_u64(5).div(W256::ZERO), W256::ZERO);
        assert_eq!(W256::from_u64(5).sdiv(W256::ZERO), W256::ZERO);
    }

    #[test]
    fn signextend_no_op_past_31() {
        let x = W256::from_u64(0xff);
        assert_eq!(x.signextend(W256::from_u64(32)), x);
    }

    #[test]
    fn signextend_at_31_is_identity_and_does_not_panic() {
        let x = W256::from_u64(0xff).negate();
        assert_eq!(x.signextend(W256::from_u64(31)), x);
    }

    #[test]
    fn signextend_extends_negative_byte() {
        let x = W256::from_u64(0xff);
        let extended = x.signextend(W256::ZERO);
        assert_eq!(extended, W256::ZERO.negate());
    }

    #[test]
    fn byte_indexes_from_most_significant_end() {
        let x = W256::from_u64(0x01_02);
        assert_eq!(x.byte(W256::from_u64(31)), W256::from_u64(0x02));
        assert_eq!(x.byte(W256::from_u64(30)), W256::from_u64(0x01));
        assert_eq!(x.byte(W256::from_u64(32)), W256::ZERO);
    }

    #[test]
    fn sar_of_negative_fills_with_ones() {
        let neg_one = W256::ZERO.wrapping_sub(W256::from_u64(1));
        assert_eq!(neg_one.sar(W256::from_u64(4)), neg_one);
    }
}
