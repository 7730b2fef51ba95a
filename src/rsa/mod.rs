use std::path::{Path, PathBuf};
use chrono::Local;
use clap::{Parser, ValueEnum};
use tracing::debug;

pub mod cipher;
pub mod config;
pub mod error;
pub mod keys;
pub mod prime_gen;

pub use cipher::*;
pub use config::*;
pub use error::*;
pub use keys::*;
pub use prime_gen::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    Generate,
    Encrypt,
    Decrypt,
    Inspect,
}

#[derive(Debug, Parser)]
#[command(name = "easy-rsa", version, about = "Textbook RSA key generation and file encryption / decryption")]
pub struct Rsa {
    #[arg(short, long, value_enum, default_value_t = RunMode::Generate, help = "Run mode")]
    pub mode: RunMode,
    #[arg(short, long, required_if_eq_any([("mode", "encrypt"), ("mode", "decrypt"), ("mode", "inspect")]),
          help = "Key file, `.pubk' to encrypt and `.pvtk' to decrypt")]
    pub key: Option<PathBuf>,
    #[arg(short, long, required_if_eq_any([("mode", "encrypt"), ("mode", "decrypt")]), help = "Input filename")]
    pub input: Option<PathBuf>,
    #[arg(short, long, help = "Output filename, derived from the input when omitted")]
    pub output: Option<PathBuf>,
    #[arg(short = 'd', long, default_value_os_t = CONFIG_DEF.save_dir.clone(), help = "Directory to save generated keys in")]
    pub save_dir: PathBuf,
    #[arg(short, long, default_value_t = CONFIG_DEF.key_name.clone(), help = "Base name of generated key files")]
    pub name: String,
    #[arg(long, default_value_t = CONFIG_DEF.prime_bits, value_parser = clap::value_parser!(u64).range(2..), help = "Bits of each prime")]
    pub prime_bits: u64,
    #[arg(long, default_value_t = CONFIG_DEF.block_size as u32, value_parser = clap::value_parser!(u32).range(1..), help = "Plaintext bytes per block")]
    pub block_size: u32,
    #[arg(short, long, default_value_t = CONFIG_DEF.silent, help = "Disable log output")]
    pub silent: bool,
}

fn required(path: &Option<PathBuf>) -> Result<&Path> {
    path.as_deref().ok_or_else(|| RsaError::PathError { path: PathBuf::new() })
}

/// Generates a key pair and writes `<save_dir>/<key_name>.pubk` / `.pvtk`.
pub fn generate_keys(config: &Config) -> Result<(PathBuf, PathBuf)> {
    if !config.save_dir.is_dir() {
        return Err(RsaError::PathError { path: config.save_dir.clone() });
    }
    let pair = KeyPair::generate(config.prime_bits)?;
    pair.save(&config.save_dir, &config.key_name)
}

/// Encrypts `input` with the public key at `key`, returning the written path.
pub fn encrypt_with_key(config: &Config, key: &Path, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let public = PublicKey::load(key)?;
    let file = BlockCipher::from(config).encrypt_file(input, &public)?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| encrypted_path(input));
    file.write(&output)?;
    Ok(output)
}

/// Decrypts `input` with the private key at `key`, returning the written path.
pub fn decrypt_with_key(config: &Config, key: &Path, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let private = PrivateKey::load(key)?;
    let data = BlockCipher::from(config).decrypt_file(input, &private)?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| decrypted_path(input));
    write_output(&output, &data)?;
    Ok(output)
}

/// `None` when `path` is a regular file but not a key file.
pub fn inspect_key(path: &Path) -> Result<Option<KeyFile>> {
    match detect_key_kind(path)? {
        Some(_) => read_key_file(path).map(Some),
        None => Ok(None),
    }
}

impl Rsa {
    pub fn config(&self) -> Config {
        Config {
            prime_bits: self.prime_bits,
            block_size: self.block_size as usize,
            save_dir: self.save_dir.clone(),
            key_name: self.name.clone(),
            silent: self.silent,
        }
    }

    pub fn run(&self) -> Result<()> {
        let config = self.config();
        debug!(?config, mode = ?self.mode, "Run");
        let start = Local::now().timestamp_millis();
        match self.mode {
            RunMode::Generate => {
                if !self.silent { println!("Start generating new keys..."); }
                let (public, private) = generate_keys(&config)?;
                if !self.silent { println!("Generated key files: {}, {}", public.display(), private.display()); }
            }
            RunMode::Encrypt => {
                let output = encrypt_with_key(&config, required(&self.key)?, required(&self.input)?, self.output.as_deref())?;
                if !self.silent { println!("Encrypted file to {}", output.display()); }
            }
            RunMode::Decrypt => {
                let output = decrypt_with_key(&config, required(&self.key)?, required(&self.input)?, self.output.as_deref())?;
                if !self.silent { println!("Decrypted file to {}", output.display()); }
            }
            RunMode::Inspect => {
                let path = required(&self.key)?;
                match inspect_key(path)? {
                    Some(key) => println!("{} key, modulus {} bits: {}", key.kind, key.first.bits(), path.display()),
                    None => println!("Not a key file: {}", path.display()),
                }
            }
        }
        if !self.silent { println!("Time: {} ms", Local::now().timestamp_millis() - start); }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use clap::CommandFactory;
    use super::*;

    fn small_config(dir: &Path) -> Config {
        Config { prime_bits: 64, block_size: 8, save_dir: dir.to_path_buf(), key_name: "test".to_string(), silent: true }
    }

    #[test]
    fn cli_definition() {
        Rsa::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let rsa = Rsa::try_parse_from(["easy-rsa"]).unwrap();
        assert_eq!(rsa.mode, RunMode::Generate);
        assert_eq!(rsa.config(), Config::default());
    }

    #[test]
    fn cli_requires_paths() {
        assert!(Rsa::try_parse_from(["easy-rsa", "-m", "encrypt", "-i", "a.txt"]).is_err());
        assert!(Rsa::try_parse_from(["easy-rsa", "-m", "decrypt", "-k", "key.pvtk"]).is_err());
        assert!(Rsa::try_parse_from(["easy-rsa", "--block-size", "0"]).is_err());
        assert!(Rsa::try_parse_from(["easy-rsa", "--prime-bits", "1"]).is_err());
        let rsa = Rsa::try_parse_from(["easy-rsa", "-m", "decrypt", "-k", "key.pvtk", "-i", "a.enc", "-s"]).unwrap();
        assert_eq!(rsa.mode, RunMode::Decrypt);
        assert!(rsa.silent);
    }

    #[test]
    fn function_test() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let (public, private) = generate_keys(&config).unwrap();
        assert_eq!(public, dir.path().join("test.pubk"));
        assert_eq!(private, dir.path().join("test.pvtk"));

        let source = dir.path().join("notes.txt");
        let data = b"The quick brown fox jumps over the lazy dog\n\0\0".to_vec();
        fs::write(&source, &data).unwrap();
        let encrypted = encrypt_with_key(&config, &public, &source, None).unwrap();
        assert_eq!(encrypted, dir.path().join("notes.txt.enc"));
        assert_eq!(&fs::read(&encrypted).unwrap()[..4], b"ENCF");

        fs::remove_file(&source).unwrap();
        let decrypted = decrypt_with_key(&config, &private, &encrypted, None).unwrap();
        assert_eq!(decrypted, source);
        assert_eq!(fs::read(&decrypted).unwrap(), data);

        let renamed = dir.path().join("notes.bin");
        fs::rename(&encrypted, &renamed).unwrap();
        let decrypted = decrypt_with_key(&config, &private, &renamed, None).unwrap();
        assert_eq!(decrypted, dir.path().join("dec_notes.bin"));
        assert_eq!(fs::read(&decrypted).unwrap(), data);
    }

    #[test]
    fn keys_are_checked_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let (public, private) = generate_keys(&config).unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"abc").unwrap();
        assert!(matches!(
            encrypt_with_key(&config, &private, &source, None),
            Err(RsaError::WrongKeyKind { expected: KeyKind::Public, found: KeyKind::Private })
        ));
        assert!(matches!(encrypt_with_key(&config, &source, &source, None), Err(RsaError::InvalidKeyFile { .. })));
        let output = dir.path().join("explicit.out");
        assert_eq!(encrypt_with_key(&config, &public, &source, Some(&output)).unwrap(), output);
        assert!(matches!(decrypt_with_key(&config, &private, &source, None), Err(RsaError::NotAnEncryptedFile { .. })));
        assert!(!dir.path().join("dec_a.txt").exists());
    }

    #[test]
    fn inspect() {
        let dir = tempfile::tempdir().unwrap();
        let (public, private) = generate_keys(&small_config(dir.path())).unwrap();
        let key = inspect_key(&public).unwrap().unwrap();
        assert_eq!(key.kind, KeyKind::Public);
        assert!(key.first.bits() >= 127);
        assert_eq!(inspect_key(&private).unwrap().unwrap().kind, KeyKind::Private);
        let other = dir.path().join("other");
        fs::write(&other, b"hello world").unwrap();
        assert_eq!(inspect_key(&other).unwrap(), None);
        assert!(matches!(inspect_key(&dir.path().join("missing")), Err(RsaError::PathError { .. })));
    }

    #[test]
    fn generate_into_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(&dir.path().join("missing"));
        assert!(matches!(generate_keys(&config), Err(RsaError::PathError { .. })));
    }
}
