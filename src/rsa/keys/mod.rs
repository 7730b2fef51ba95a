pub mod key_writer;
pub mod key_reader;
pub mod key_pair;

pub use key_pair::*;
pub use key_reader::*;
pub use key_writer::*;

use std::fmt::{Display, Formatter};
use num::Integer;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{CheckedSub, One, Zero};

use crate::rsa::error::{Result, RsaError};
use crate::rsa::prime_gen::fast_modular_exponent;

pub const PUBK_MAGIC: &[u8; 4] = b"PUBK";
pub const PVTK_MAGIC: &[u8; 4] = b"PVTK";

/// Conventional public exponent, tried before scanning small odd values.
pub const PREFERRED_EXPONENT: u32 = 65537;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Public,
    Private,
}

impl KeyKind {
    pub fn magic(&self) -> &'static [u8; 4] {
        match self {
            KeyKind::Public => PUBK_MAGIC,
            KeyKind::Private => PVTK_MAGIC,
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<KeyKind> {
        match magic {
            m if m == PUBK_MAGIC => Some(KeyKind::Public),
            m if m == PVTK_MAGIC => Some(KeyKind::Private),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            KeyKind::Public => "pubk",
            KeyKind::Private => "pvtk",
        }
    }
}

impl Display for KeyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Public => write!(f, "public"),
            KeyKind::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub n: BigUint,
    pub e: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub n: BigUint,
    pub d: BigUint,
}

impl PublicKey {
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// `m^e mod n`.
    ///
    /// The caller must keep `m < n`; larger values are silently reduced
    /// modulo `n` and cannot be recovered by [`PrivateKey::decrypt`].
    pub fn encrypt(&self, m: &BigUint) -> BigUint {
        fast_modular_exponent(m, &self.e, &self.n)
    }
}

impl PrivateKey {
    pub fn new(n: BigUint, d: BigUint) -> Self {
        Self { n, d }
    }

    /// `c^d mod n`.
    pub fn decrypt(&self, c: &BigUint) -> BigUint {
        fast_modular_exponent(c, &self.d, &self.n)
    }
}

/// `(n, φ)` for primes `p` and `q`. A zero factor yields `φ = 0`.
pub fn derive_modulus(p: &BigUint, q: &BigUint) -> (BigUint, BigUint) {
    let one = BigUint::one();
    let p1 = p.checked_sub(&one).unwrap_or_default();
    let q1 = q.checked_sub(&one).unwrap_or_default();
    (p * q, p1 * q1)
}

/// 65537 when it is usable, otherwise the smallest odd `e >= 3` with
/// `gcd(e, φ) = 1` and `e < φ`.
pub fn choose_public_exponent(phi: &BigUint) -> Result<BigUint> {
    let preferred = BigUint::from(PREFERRED_EXPONENT);
    if preferred < *phi && preferred.gcd(phi).is_one() {
        return Ok(preferred);
    }
    let mut e = BigUint::from(3u32);
    while e < *phi {
        if e.gcd(phi).is_one() { return Ok(e); }
        e += 2u32;
    }
    Err(RsaError::NoValidExponent)
}

fn extended_euclid(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
        let next_t = &old_t - &quotient * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }
    (old_r, old_s, old_t)
}

/// Inverse of `e` modulo `φ`.
pub fn compute_private_exponent(e: &BigUint, phi: &BigUint) -> Result<BigUint> {
    if phi.is_zero() { return Err(RsaError::InverseUndefined); }
    let f = BigInt::from_biguint(Sign::Plus, phi.clone());
    let (g, x, _) = extended_euclid(&BigInt::from_biguint(Sign::Plus, e.clone()), &f);
    if !g.is_one() { return Err(RsaError::InverseUndefined); }
    (x.mod_floor(&f)).to_biguint().ok_or(RsaError::InverseUndefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(x: u64) -> BigUint {
        BigUint::from(x)
    }

    #[test]
    fn textbook_vector() {
        let (n, phi) = derive_modulus(&big(61), &big(53));
        assert_eq!(n, big(3233));
        assert_eq!(phi, big(3120));
        let d = compute_private_exponent(&big(17), &phi).unwrap();
        assert_eq!(d, big(2753));
        let public = PublicKey::new(n.clone(), big(17));
        let private = PrivateKey::new(n, d);
        assert_eq!(public.encrypt(&big(65)), big(2790));
        assert_eq!(private.decrypt(&big(2790)), big(65));
    }

    #[test]
    fn test_simple_data() {
        let (n, phi) = derive_modulus(&big(17), &big(11));
        let d = compute_private_exponent(&big(7), &phi).unwrap();
        assert_eq!(d, big(23));
        let public = PublicKey::new(n.clone(), big(7));
        let private = PrivateKey::new(n, d);
        let c = public.encrypt(&big(88));
        assert_eq!(c, big(11));
        assert_eq!(private.decrypt(&c), big(88));
    }

    #[test]
    fn exponent_falls_back_to_small_odd() {
        assert_eq!(choose_public_exponent(&big(3120)).unwrap(), big(7));
        assert_eq!(choose_public_exponent(&big(780)).unwrap(), big(7));
        assert_eq!(choose_public_exponent(&big(4)).unwrap(), big(3));
        assert_eq!(choose_public_exponent(&big(1_000_000)).unwrap(), big(65537));
        // 65537 divides this totient
        assert_eq!(choose_public_exponent(&big(65537 * 6)).unwrap(), big(5));
    }

    #[test]
    fn exponent_unavailable() {
        assert!(matches!(choose_public_exponent(&big(2)), Err(RsaError::NoValidExponent)));
        assert!(matches!(choose_public_exponent(&big(3)), Err(RsaError::NoValidExponent)));
        assert!(matches!(choose_public_exponent(&BigUint::zero()), Err(RsaError::NoValidExponent)));
    }

    #[test]
    fn inverse_undefined() {
        assert!(matches!(compute_private_exponent(&big(6), &big(780)), Err(RsaError::InverseUndefined)));
        assert!(matches!(compute_private_exponent(&big(3), &BigUint::zero()), Err(RsaError::InverseUndefined)));
    }

    #[test]
    fn test_mod_reverse() {
        let phi = big(3120);
        for e in [7u64, 11, 17, 23, 3119] {
            let d = compute_private_exponent(&big(e), &phi).unwrap();
            assert!(d < phi);
            assert!(((&d * big(e)) % &phi).is_one());
        }
    }

    #[test]
    fn magic_kinds() {
        assert_eq!(KeyKind::from_magic(b"PUBK"), Some(KeyKind::Public));
        assert_eq!(KeyKind::from_magic(b"PVTK"), Some(KeyKind::Private));
        assert_eq!(KeyKind::from_magic(b"ENCF"), None);
        assert_eq!(KeyKind::from_magic(&[0; 4]), None);
        assert_eq!(KeyKind::Private.magic(), PVTK_MAGIC);
        assert_eq!(KeyKind::Public.to_string(), "public");
    }
}
