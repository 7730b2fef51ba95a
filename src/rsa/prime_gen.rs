use chrono::Local;
use lazy_static::lazy_static;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};
use tracing::debug;

use crate::rsa::error::{Result, RsaError};

/// Rounds of Miller-Rabin per candidate. A composite passes one round with
/// probability at most 1/4, so 64 rounds bound false positives by 2^-128.
pub const MILLER_RABIN_ROUNDS: u32 = 64;

/// Trial division runs over every prime below this bound.
const SMALL_PRIME_LIMIT: usize = 2000;

/// Candidates drawn per requested bit before giving up.
const ATTEMPTS_PER_BIT: u64 = 64;

lazy_static! {
    pub static ref SMALL_PRIMES: Vec<u32> = {
        let mut sieve = vec![true; SMALL_PRIME_LIMIT];
        sieve[0] = false;
        sieve[1] = false;
        let mut i = 2;
        while i * i < SMALL_PRIME_LIMIT {
            if sieve[i] {
                (i * i..SMALL_PRIME_LIMIT).step_by(i).for_each(|j| sieve[j] = false);
            }
            i += 1;
        }
        sieve.iter().enumerate().filter(|x| *x.1).map(|x| x.0 as u32).collect()
    };
}

/// Square-and-multiply `a^q mod n`.
pub fn fast_modular_exponent(a: &BigUint, q: &BigUint, n: &BigUint) -> BigUint {
    if n.is_one() { return BigUint::zero(); }
    let mut r = BigUint::one();
    let mut a = a % n;
    let mut q = q.clone();
    while !q.is_zero() {
        if q.bit(0) { r = (r * &a) % n; }
        q >>= 1;
        a = (&a * &a) % n;
    }
    r
}

/// `Some(true)` when `n` divides by a small prime, `Some(false)` when `n` is
/// itself one of them, `None` when trial division is inconclusive.
fn trial_division(n: &BigUint) -> Option<bool> {
    for &p in SMALL_PRIMES.iter() {
        if *n == BigUint::from(p) { return Some(false); }
        if (n % p).is_zero() { return Some(true); }
    }
    None
}

pub fn miller_rabin<R: Rng + ?Sized>(rng: &mut R, n: &BigUint, rounds: u32) -> bool {
    let two = BigUint::from(2u32);
    if *n < two { return false; }
    if *n == two || *n == BigUint::from(3u32) { return true; }
    if !n.bit(0) { return false; }
    let n_minus_1 = n - 1u32;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;
    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_1);
        let mut x = fast_modular_exponent(&a, &d, n);
        if x.is_one() || x == n_minus_1 { continue; }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_1 { continue 'witness; }
        }
        return false;
    }
    true
}

pub fn is_probable_prime(n: &BigUint) -> bool {
    match trial_division(n) {
        Some(composite) => !composite && *n > BigUint::one(),
        None => miller_rabin(&mut rand::thread_rng(), n, MILLER_RABIN_ROUNDS),
    }
}

/// Draws a prime of exactly `bits` bits from the thread-local CSPRNG.
pub fn generate_prime(bits: u64) -> Result<BigUint> {
    generate_prime_with(&mut rand::thread_rng(), bits)
}

pub fn generate_prime_with<R: Rng + CryptoRng + ?Sized>(rng: &mut R, bits: u64) -> Result<BigUint> {
    if bits < 2 { return Err(RsaError::InvalidBitLength(bits)); }
    let max_attempts = bits.max(16) * ATTEMPTS_PER_BIT;
    let top = BigUint::one() << (bits - 1);
    let start = Local::now().timestamp_millis();
    for attempt in 1..=max_attempts {
        let candidate = rng.gen_biguint(bits) | &top | BigUint::one();
        let passed = match trial_division(&candidate) {
            Some(composite) => !composite,
            None => miller_rabin(rng, &candidate, MILLER_RABIN_ROUNDS),
        };
        if passed {
            debug!(bits, tries = attempt, ms = Local::now().timestamp_millis() - start, "Done prime generation");
            return Ok(candidate);
        }
    }
    debug!(bits, tries = max_attempts, ms = Local::now().timestamp_millis() - start, "Failed prime generation");
    Err(RsaError::PrimeSearchExhausted { bits, attempts: max_attempts })
}
