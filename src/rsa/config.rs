use std::path::PathBuf;
use lazy_static::lazy_static;

use crate::rsa::cipher::BLOCK_SIZE;

/// Settings handed to every operation. Nothing here is read from globals at
/// call time; `CONFIG_DEF` only seeds the command-line defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bit length of each of the two primes.
    pub prime_bits: u64,
    /// Plaintext bytes per block. Encrypt and decrypt must agree on it.
    pub block_size: usize,
    pub save_dir: PathBuf,
    pub key_name: String,
    pub silent: bool,
}

lazy_static! {
    pub static ref CONFIG_DEF: Config = Config {
        // n ends up above 2^4096, so a full 512 byte block always fits
        prime_bits: 2056,
        block_size: BLOCK_SIZE,
        save_dir: PathBuf::from("."),
        key_name: String::from("key"),
        silent: false,
    };
}

impl Default for Config {
    fn default() -> Self {
        CONFIG_DEF.clone()
    }
}
