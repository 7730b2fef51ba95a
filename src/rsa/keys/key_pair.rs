use std::fs;
use std::path::{Path, PathBuf};
use num_bigint::BigUint;
use num_traits::One;
use tracing::{debug, info};

use crate::rsa::cipher::stage_output;
use crate::rsa::error::{Result, RsaError};
use crate::rsa::keys::*;
use crate::rsa::prime_gen::generate_prime;

/// Redraws of `q` allowed while it keeps colliding with `p`.
const MAX_PRIME_REDRAWS: u64 = 64;

/// Fully derived key material. Only obtainable through [`derive_keypair`],
/// so `e` and `d` are always both present and consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// Computes `n`, `φ`, `e` and `d` from two primes in one step.
pub fn derive_keypair(p: &BigUint, q: &BigUint) -> Result<KeyPair> {
    let (n, phi) = derive_modulus(p, q);
    let e = choose_public_exponent(&phi)?;
    let d = compute_private_exponent(&e, &phi)?;
    if !((&d * &e) % &phi).is_one() {
        return Err(RsaError::InverseUndefined);
    }
    debug!(modulus_bits = n.bits(), %e, "Derived key pair");
    Ok(KeyPair { public: PublicKey::new(n.clone(), e), private: PrivateKey::new(n, d) })
}

impl KeyPair {
    /// Draws two distinct primes of `prime_bits` bits each.
    pub fn generate(prime_bits: u64) -> Result<KeyPair> {
        let p = generate_prime(prime_bits)?;
        let mut q = generate_prime(prime_bits)?;
        let mut redraws = 0;
        while q == p {
            redraws += 1;
            if redraws > MAX_PRIME_REDRAWS {
                return Err(RsaError::PrimeSearchExhausted { bits: prime_bits, attempts: redraws });
            }
            q = generate_prime(prime_bits)?;
        }
        derive_keypair(&p, &q)
    }

    pub fn key_paths<P: AsRef<Path>>(dir: P, name: &str) -> (PathBuf, PathBuf) {
        let dir = dir.as_ref();
        (
            dir.join(format!("{}.{}", name, KeyKind::Public.extension())),
            dir.join(format!("{}.{}", name, KeyKind::Private.extension())),
        )
    }

    /// Writes `<dir>/<name>.pubk` and `<dir>/<name>.pvtk`. Both records are
    /// staged first; on failure neither key file is left in place.
    pub fn save<P: AsRef<Path>>(&self, dir: P, name: &str) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(RsaError::PathError { path: dir.to_path_buf() });
        }
        let (path_public, path_private) = KeyPair::key_paths(dir, name);
        let public = encode_key_file(KeyKind::Public, &self.public.n, &self.public.e);
        let private = encode_key_file(KeyKind::Private, &self.private.n, &self.private.d);
        let tmp_public = stage_output(&path_public, &public)?;
        let tmp_private = match stage_output(&path_private, &private) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&tmp_public);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&tmp_public, &path_public) {
            let _ = fs::remove_file(&tmp_public);
            let _ = fs::remove_file(&tmp_private);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp_private, &path_private) {
            let _ = fs::remove_file(&tmp_private);
            let _ = fs::remove_file(&path_public);
            return Err(e.into());
        }
        info!(public = %path_public.display(), private = %path_private.display(), "Saved key pair");
        Ok((path_public, path_private))
    }
}
