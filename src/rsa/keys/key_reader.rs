use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use num_bigint::BigUint;
use tracing::debug;

use crate::rsa::error::{Result, RsaError};
use crate::rsa::keys::{KeyKind, PrivateKey, PublicKey};

/// Decoded PUBK / PVTK record. PUBK carries `(n, e)`, PVTK carries `(n, d)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    pub kind: KeyKind,
    pub first: BigUint,
    pub second: BigUint,
}

impl KeyFile {
    /// `None` when the magic is unrecognized or a field is cut short.
    pub fn parse(data: &[u8]) -> Option<KeyFile> {
        let mut cur = Cursor::new(data);
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic).ok()?;
        let kind = KeyKind::from_magic(&magic)?;
        let mut len = [0u8; 4];
        cur.read_exact(&mut len).ok()?;
        let len_first = u32::from_le_bytes(len) as usize;
        cur.read_exact(&mut len).ok()?;
        let len_second = u32::from_le_bytes(len) as usize;
        let rest = &data[cur.position() as usize..];
        if rest.len() < len_first + len_second { return None; }
        let first = BigUint::from_bytes_le(&rest[..len_first]);
        let second = BigUint::from_bytes_le(&rest[len_first..len_first + len_second]);
        Some(KeyFile { kind, first, second })
    }

    pub fn into_public(self) -> Result<PublicKey> {
        match self.kind {
            KeyKind::Public => Ok(PublicKey::new(self.first, self.second)),
            found => Err(RsaError::WrongKeyKind { expected: KeyKind::Public, found }),
        }
    }

    pub fn into_private(self) -> Result<PrivateKey> {
        match self.kind {
            KeyKind::Private => Ok(PrivateKey::new(self.first, self.second)),
            found => Err(RsaError::WrongKeyKind { expected: KeyKind::Private, found }),
        }
    }
}

pub fn read_key_file<P: AsRef<Path>>(path: P) -> Result<KeyFile> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RsaError::PathError { path: path.to_path_buf() });
    }
    let mut content = Vec::new();
    File::open(path)?.read_to_end(&mut content)?;
    let key = KeyFile::parse(&content).ok_or_else(|| RsaError::InvalidKeyFile { path: path.to_path_buf() })?;
    debug!(path = %path.display(), kind = %key.kind, modulus_bits = key.first.bits(), "Read key file");
    Ok(key)
}

/// Looks only at the 4-byte magic. `None` for anything that is not a key file.
pub fn detect_key_kind<P: AsRef<Path>>(path: P) -> Result<Option<KeyKind>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RsaError::PathError { path: path.to_path_buf() });
    }
    let mut magic = Vec::with_capacity(4);
    File::open(path)?.take(4).read_to_end(&mut magic)?;
    Ok(KeyKind::from_magic(&magic))
}

impl PublicKey {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PublicKey> {
        read_key_file(path)?.into_public()
    }
}

impl PrivateKey {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PrivateKey> {
        read_key_file(path)?.into_private()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use num_traits::{One, Zero};
    use super::*;
    use crate::rsa::keys::{encode_key_file, write_private_key, write_public_key};

    #[test]
    fn round_trip_small() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.pubk");
        for (n, e) in [(0u32, 0u32), (1, 0), (3233, 17), (0xffff_ffff, 65537)] {
            write_public_key(&path, &BigUint::from(n), &BigUint::from(e)).unwrap();
            let key = read_key_file(&path).unwrap();
            assert_eq!(key.kind, KeyKind::Public);
            assert_eq!(key.first, BigUint::from(n));
            assert_eq!(key.second, BigUint::from(e));
        }
    }

    #[test]
    fn round_trip_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.pvtk");
        let n = (BigUint::one() << 2050) - 1u32;
        let d = (BigUint::one() << 1100) + 12345u32;
        write_private_key(&path, &n, &d).unwrap();
        let key = PrivateKey::load(&path).unwrap();
        assert_eq!(key, PrivateKey::new(n, d));
    }

    #[test]
    fn zero_magic_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zeros");
        fs::write(&path, [0u8; 64]).unwrap();
        assert!(matches!(read_key_file(&path), Err(RsaError::InvalidKeyFile { .. })));
        assert_eq!(detect_key_kind(&path).unwrap(), None);
    }

    #[test]
    fn short_files_are_invalid() {
        assert_eq!(KeyFile::parse(&[]), None);
        assert_eq!(KeyFile::parse(b"PUB"), None);
        assert_eq!(KeyFile::parse(b"PUBK\x01\x00\x00"), None);
        let mut data = encode_key_file(KeyKind::Public, &BigUint::from(3233u32), &BigUint::from(17u32));
        data.pop();
        assert_eq!(KeyFile::parse(&data), None);
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut data = encode_key_file(KeyKind::Private, &BigUint::from(3233u32), &BigUint::from(2753u32));
        data.extend_from_slice(b"junk");
        let key = KeyFile::parse(&data).unwrap();
        assert_eq!(key.second, BigUint::from(2753u32));
    }

    #[test]
    fn empty_fields() {
        let key = KeyFile::parse(b"PUBK\x00\x00\x00\x00\x00\x00\x00\x00").unwrap();
        assert!(key.first.is_zero() && key.second.is_zero());
    }

    #[test]
    fn wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.pubk");
        write_public_key(&path, &BigUint::from(3233u32), &BigUint::from(17u32)).unwrap();
        assert_eq!(detect_key_kind(&path).unwrap(), Some(KeyKind::Public));
        assert!(matches!(
            PrivateKey::load(&path),
            Err(RsaError::WrongKeyKind { expected: KeyKind::Private, found: KeyKind::Public })
        ));
    }

    #[test]
    fn missing_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_key_file(dir.path().join("nope")), Err(RsaError::PathError { .. })));
        assert!(matches!(read_key_file(dir.path()), Err(RsaError::PathError { .. })));
    }
}
