use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use indicatif::{ProgressBar, ProgressStyle};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, info};

use crate::rsa::config::Config;
use crate::rsa::error::{Result, RsaError};
use crate::rsa::keys::{PrivateKey, PublicKey};

/// Plaintext bytes per block.
pub const BLOCK_SIZE: usize = 512;
pub const ENCF_MAGIC: &[u8; 4] = b"ENCF";
pub const ENC_EXTENSION: &str = "enc";
const HEADER_LEN: usize = 12;

/// `n` as exactly `width` little-endian bytes, `None` if it needs more.
fn to_fixed_le(n: &BigUint, width: usize) -> Option<Vec<u8>> {
    let mut bytes = if n.is_zero() { Vec::new() } else { n.to_bytes_le() };
    if bytes.len() > width { return None; }
    bytes.resize(width, 0);
    Some(bytes)
}

/// ENCF container: `magic | block_width | last_plain_len | blocks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFile {
    pub block_width: u32,
    pub last_plain_len: u32,
    pub body: Vec<u8>,
}

impl EncryptedFile {
    /// Packs ciphertext integers at the widest one's minimal byte length.
    /// With no blocks at all the width falls back to the byte length of `modulus`.
    pub fn from_ciphertexts(blocks: &[BigUint], last_plain_len: u32, modulus: &BigUint) -> Result<Self> {
        let width = blocks.iter()
            .map(|c| c.to_bytes_le().len())
            .max()
            .unwrap_or_else(|| modulus.to_bytes_le().len());
        let block_width = u32::try_from(width)
            .map_err(|_| RsaError::MalformedContainer(format!("block width {} exceeds u32", width)))?;
        let mut body = Vec::with_capacity(width * blocks.len());
        for c in blocks {
            let bytes = to_fixed_le(c, width).ok_or(RsaError::BlockOverflow { index: body.len() / width, width })?;
            body.extend_from_slice(&bytes);
        }
        Ok(Self { block_width, last_plain_len, body })
    }

    /// Splits the body back into ciphertext integers. Every block but the
    /// last starts below `body.len() - block_width`; the last one is the tail.
    pub fn blocks(&self) -> Result<Vec<BigUint>> {
        let width = self.block_width as usize;
        if self.body.is_empty() {
            if self.last_plain_len != 0 {
                return Err(RsaError::MalformedContainer(format!(
                    "no blocks but last block length {}", self.last_plain_len)));
            }
            return Ok(Vec::new());
        }
        if width == 0 {
            return Err(RsaError::MalformedContainer("zero block width".to_string()));
        }
        if self.body.len() % width != 0 {
            return Err(RsaError::MalformedContainer(format!(
                "body of {} bytes is not a multiple of block width {}", self.body.len(), width)));
        }
        let split = self.body.len() - width;
        let mut res = self.body[..split].chunks(width)
            .map(BigUint::from_bytes_le)
            .collect::<Vec<_>>();
        res.push(BigUint::from_bytes_le(&self.body[split..]));
        Ok(res)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.body.len());
        buf.extend_from_slice(ENCF_MAGIC);
        buf.extend_from_slice(&self.block_width.to_le_bytes());
        buf.extend_from_slice(&self.last_plain_len.to_le_bytes());
        buf.extend_from_slice(&self.body);
        buf
    }

    /// `None` when the magic is not `ENCF` or the header is cut short.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut cur = Cursor::new(data);
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic).ok()?;
        if &magic != ENCF_MAGIC { return None; }
        let mut field = [0u8; 4];
        cur.read_exact(&mut field).ok()?;
        let block_width = u32::from_le_bytes(field);
        cur.read_exact(&mut field).ok()?;
        let last_plain_len = u32::from_le_bytes(field);
        let mut body = Vec::new();
        cur.read_to_end(&mut body).ok()?;
        Some(Self { block_width, last_plain_len, body })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = read_source(path)?;
        Self::parse(&data).ok_or_else(|| RsaError::NotAnEncryptedFile { path: path.to_path_buf() })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_output(path, &self.to_bytes())
    }
}

/// Whole file content, after checking that `path` is a regular file.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(RsaError::PathError { path: path.to_path_buf() });
    }
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    Ok(data)
}

pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes `data` to the staging file next to `path` and returns that
/// staging path. Nothing is left behind on failure.
pub(crate) fn stage_output(path: &Path, data: &[u8]) -> Result<PathBuf> {
    let tmp = staging_path(path);
    let res = File::create(&tmp).and_then(|mut f| {
        f.write_all(data)?;
        f.flush()
    });
    if let Err(e) = res {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(tmp)
}

/// Writes next to `path` first and renames into place, so a failed write
/// never leaves a truncated output behind.
pub fn write_output<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let tmp = stage_output(path, data)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = data.len(), "Wrote output");
    Ok(())
}

/// `name.ext` -> `name.ext.enc`.
pub fn encrypted_path(source: &Path) -> PathBuf {
    let mut name = source.file_name().unwrap_or_default().to_owned();
    name.push(".");
    name.push(ENC_EXTENSION);
    source.with_file_name(name)
}

/// `name.ext.enc` -> `name.ext`, anything else -> `dec_<name>`.
pub fn decrypted_path(source: &Path) -> PathBuf {
    let is_enc = source.extension().map_or(false, |ext| ext == ENC_EXTENSION);
    match source.file_stem() {
        Some(stem) if is_enc => source.with_file_name(stem),
        _ => {
            let mut name = OsString::from("dec_");
            name.push(source.file_name().unwrap_or_default());
            source.with_file_name(name)
        }
    }
}

/// Raw RSA over fixed-size plaintext blocks.
#[derive(Debug, Clone)]
pub struct BlockCipher {
    block_size: usize,
    silent: bool,
}

impl Default for BlockCipher {
    fn default() -> Self {
        Self { block_size: BLOCK_SIZE, silent: true }
    }
}

impl From<&Config> for BlockCipher {
    fn from(config: &Config) -> Self {
        Self::new(config.block_size, config.silent)
    }
}

impl BlockCipher {
    pub fn new(block_size: usize, silent: bool) -> Self {
        Self { block_size: block_size.max(1), silent }
    }

    fn progress(&self, blocks: usize) -> Option<ProgressBar> {
        if self.silent { return None; }
        let pb = ProgressBar::new((blocks * self.block_size) as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})") {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }

    /// Every plaintext block must be strictly below `n`, which holds for all
    /// blocks exactly when `n` has more bits than a block.
    fn check_key(&self, n: &BigUint) -> Result<()> {
        let block_bits = (self.block_size * 8) as u64;
        if n.bits() <= block_bits {
            return Err(RsaError::KeyTooSmall { modulus_bits: n.bits(), block_bits });
        }
        Ok(())
    }

    pub fn encrypt(&self, data: &[u8], key: &PublicKey) -> Result<EncryptedFile> {
        self.check_key(&key.n)?;
        let chunks = data.chunks(self.block_size).collect::<Vec<_>>();
        let last_plain_len = chunks.last().map_or(0, |c| c.len());
        debug!(bytes = data.len(), blocks = chunks.len(), last_plain_len, "Encrypting");
        let pb = self.progress(chunks.len());
        let mut ciphertexts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            ciphertexts.push(key.encrypt(&BigUint::from_bytes_le(chunk)));
            if let Some(pb) = &pb { pb.inc(self.block_size as u64); }
        }
        if let Some(pb) = &pb { pb.finish_with_message("Done"); }
        EncryptedFile::from_ciphertexts(&ciphertexts, last_plain_len as u32, &key.n)
    }

    pub fn decrypt(&self, file: &EncryptedFile, key: &PrivateKey) -> Result<Vec<u8>> {
        let last_plain_len = file.last_plain_len as usize;
        if last_plain_len > self.block_size {
            return Err(RsaError::MalformedContainer(format!(
                "last block length {} exceeds block size {}", last_plain_len, self.block_size)));
        }
        let blocks = file.blocks()?;
        debug!(blocks = blocks.len(), block_width = file.block_width, last_plain_len, "Decrypting");
        let pb = self.progress(blocks.len());
        let mut res = Vec::with_capacity(blocks.len() * self.block_size);
        let count = blocks.len();
        for (index, c) in blocks.iter().enumerate() {
            let width = if index + 1 == count { last_plain_len } else { self.block_size };
            let m = key.decrypt(c);
            let bytes = to_fixed_le(&m, width).ok_or(RsaError::BlockOverflow { index, width })?;
            res.extend_from_slice(&bytes);
            if let Some(pb) = &pb { pb.inc(self.block_size as u64); }
        }
        if let Some(pb) = &pb { pb.finish_with_message("Done"); }
        Ok(res)
    }

    pub fn encrypt_file<P: AsRef<Path>>(&self, path: P, key: &PublicKey) -> Result<EncryptedFile> {
        let data = read_source(path.as_ref())?;
        let file = self.encrypt(&data, key)?;
        info!(path = %path.as_ref().display(), bytes = data.len(), block_width = file.block_width, "Encrypted file");
        Ok(file)
    }

    pub fn decrypt_file<P: AsRef<Path>>(&self, path: P, key: &PrivateKey) -> Result<Vec<u8>> {
        let file = EncryptedFile::read(path.as_ref())?;
        let data = self.decrypt(&file, key)?;
        info!(path = %path.as_ref().display(), bytes = data.len(), "Decrypted file");
        Ok(data)
    }
}
