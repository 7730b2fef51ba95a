use std::path::Path;
use num_bigint::BigUint;
use tracing::debug;

use crate::rsa::cipher::write_output;
use crate::rsa::error::Result;
use crate::rsa::keys::{KeyKind, PrivateKey, PublicKey};

/// `magic | len1 | len2 | field1 | field2`, lengths as little-endian `u32`
/// and fields as minimal little-endian byte strings.
pub fn encode_key_file(kind: KeyKind, first: &BigUint, second: &BigUint) -> Vec<u8> {
    let first = first.to_bytes_le();
    let second = second.to_bytes_le();
    let mut buf = Vec::with_capacity(12 + first.len() + second.len());
    buf.extend_from_slice(kind.magic());
    buf.extend_from_slice(&(first.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(second.len() as u32).to_le_bytes());
    buf.extend_from_slice(&first);
    buf.extend_from_slice(&second);
    buf
}

pub fn write_key_file<P: AsRef<Path>>(path: P, kind: KeyKind, first: &BigUint, second: &BigUint) -> Result<()> {
    let data = encode_key_file(kind, first, second);
    write_output(path.as_ref(), &data)?;
    debug!(path = %path.as_ref().display(), %kind, bytes = data.len(), "Wrote key file");
    Ok(())
}

pub fn write_public_key<P: AsRef<Path>>(path: P, n: &BigUint, e: &BigUint) -> Result<()> {
    write_key_file(path, KeyKind::Public, n, e)
}

pub fn write_private_key<P: AsRef<Path>>(path: P, n: &BigUint, d: &BigUint) -> Result<()> {
    write_key_file(path, KeyKind::Private, n, d)
}

impl PublicKey {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_public_key(path, &self.n, &self.e)
    }
}

impl PrivateKey {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_private_key(path, &self.n, &self.d)
    }
}
