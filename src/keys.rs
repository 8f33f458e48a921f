//! Management of the RSA key pair that signs license keys.
//!
//! The private key file is the root of trust: whoever holds it can mint
//! arbitrary licenses. It is written once, owner-readable only, and never
//! overwritten.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Modulus size of generated keys, and the smallest size accepted on load.
pub const KEY_BITS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyError {
    #[error("private key file {0} does not exist")]
    NotFound(PathBuf),
    #[error("private key is corrupt: {0}")]
    Corrupt(String),
    #[error("private key file {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("key encoding failed: {0}")]
    Encoding(String),
    #[error("I/O failure on private key file: {0}")]
    Io(String),
}

/// Where the key returned by [`load_or_generate`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Loaded,
    Generated,
}

/// The issuer's private key.
#[derive(Clone)]
pub struct IssuerKey {
    private_key: RsaPrivateKey,
}

impl IssuerKey {
    /// Parses a PKCS#1 or PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|_| KeyError::Corrupt("not a PEM encoded RSA private key".to_owned()))?;

        if private_key.size() * 8 < KEY_BITS {
            return Err(KeyError::Corrupt(format!(
                "key has {} bits, at least {} required",
                private_key.size() * 8,
                KEY_BITS
            )));
        }

        Ok(Self { private_key })
    }

    pub fn bits(&self) -> usize {
        self.private_key.size() * 8
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    pub(crate) fn into_rsa_private_key(self) -> RsaPrivateKey {
        self.private_key
    }
}

impl fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

pub fn generate() -> Result<IssuerKey, KeyError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
        .map_err(|e| KeyError::Generation(e.to_string()))?;
    tracing::info!(bits = KEY_BITS, "generated new signing key pair");
    Ok(IssuerKey { private_key })
}

/// Reads the private key at `path`.
///
/// A missing file is [`KeyError::NotFound`]; a file that exists but does not
/// hold a usable key is [`KeyError::Corrupt`] and must not be replaced.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<IssuerKey, KeyError> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(KeyError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(KeyError::Io(e.to_string())),
    };
    let pem = String::from_utf8(bytes)
        .map_err(|_| KeyError::Corrupt("file is not valid PEM text".to_owned()))?;

    let key = IssuerKey::from_pem(&pem)?;
    tracing::debug!(path = %path.display(), bits = key.bits(), "loaded signing key");
    Ok(key)
}

/// Writes `key` as PKCS#1 PEM with owner-only permissions.
///
/// The PEM is written and synced to a temporary file next to `path`, then
/// linked into place only if `path` does not exist yet. Readers never see a
/// partially written key, and an existing key is never clobbered.
pub fn save_private_key(key: &IssuerKey, path: impl AsRef<Path>) -> Result<(), KeyError> {
    let path = path.as_ref();
    let pem = key
        .private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // Temporary files are created with mode 0600 on Unix.
    let mut temp_file = tempfile::Builder::new()
        .prefix(".private-key-")
        .tempfile_in(dir)
        .map_err(|e| KeyError::Io(e.to_string()))?;
    temp_file
        .write_all(pem.as_bytes())
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|e| KeyError::Io(e.to_string()))?;

    temp_file.persist_noclobber(path).map_err(|e| match e.error.kind() {
        io::ErrorKind::AlreadyExists => KeyError::AlreadyExists(path.to_path_buf()),
        _ => KeyError::Io(e.error.to_string()),
    })?;

    tracing::info!(path = %path.display(), "saved signing key");
    Ok(())
}

/// Loads the key at `path`, or generates and persists one if there is none.
///
/// Losing a creation race to another process is resolved by loading the
/// winner's key.
pub fn load_or_generate(path: impl AsRef<Path>) -> Result<(IssuerKey, KeyOrigin), KeyError> {
    load_or_generate_with(path.as_ref(), generate)
}

fn load_or_generate_with(
    path: &Path,
    generate: impl FnOnce() -> Result<IssuerKey, KeyError>,
) -> Result<(IssuerKey, KeyOrigin), KeyError> {
    match load_private_key(path) {
        Ok(key) => Ok((key, KeyOrigin::Loaded)),
        Err(KeyError::NotFound(_)) => {
            tracing::warn!(path = %path.display(), "no signing key found, generating a new one");
            let key = generate()?;
            match save_private_key(&key, path) {
                Ok(()) => Ok((key, KeyOrigin::Generated)),
                Err(KeyError::AlreadyExists(_)) => {
                    load_private_key(path).map(|key| (key, KeyOrigin::Loaded))
                }
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// The SubjectPublicKeyInfo PEM to embed in verifying deployments.
pub fn public_key_pem(key: &IssuerKey) -> Result<String, KeyError> {
    key.public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))
}
