use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::rsa::keys::KeyKind;

#[derive(Error, Debug)]
pub enum RsaError {
    #[error("Not a valid key file: {path}")]
    InvalidKeyFile { path: PathBuf },

    #[error("Not an encrypted file: {path}")]
    NotAnEncryptedFile { path: PathBuf },

    #[error("Invalid file path: {path}")]
    PathError { path: PathBuf },

    /// No `e` with `1 < e < φ` and `gcd(e, φ) = 1` exists.
    #[error("No valid public exponent below the totient")]
    NoValidExponent,

    /// `e` has no inverse modulo `φ`.
    #[error("Public exponent is not invertible modulo the totient")]
    InverseUndefined,

    #[error("Cannot generate a prime of {0} bits")]
    InvalidBitLength(u64),

    #[error("No prime of {bits} bits found after {attempts} candidates")]
    PrimeSearchExhausted { bits: u64, attempts: u64 },

    #[error("Expected a {expected} key, found a {found} key")]
    WrongKeyKind { expected: KeyKind, found: KeyKind },

    #[error("Modulus of {modulus_bits} bits cannot hold {block_bits}-bit blocks")]
    KeyTooSmall { modulus_bits: u64, block_bits: u64 },

    #[error("Malformed encrypted file: {0}")]
    MalformedContainer(String),

    #[error("Block {index} does not fit in {width} bytes, wrong key?")]
    BlockOverflow { index: usize, width: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RsaError>;
