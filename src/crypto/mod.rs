//! Key resolution, block decryption and integrity checks.
//!
//! crypt5 uses AES-192-CBC with a key hashed from the account name.
//! crypt7 uses AES-256-CBC with key and IV from the key file plus an HMAC-SHA256 trailer.
//! crypt8 and crypt12 use AES-256-GCM with the key from the key file and the nonce from the header.

mod account;
pub mod cipher;
pub mod integrity;
mod key_file;

use std::fmt;

use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, WaError};
use crate::formats::{CryptVersion, KeyDerivation, VersionProfile};
use crate::parsing::BackupHeader;

pub use account::derive_account_key;
pub use key_file::unwrap_key_file;

/// Reason reported when a key file is valid but was not written for the container.
pub const KEY_BINDING_MISMATCH: &str = "key file does not belong to this backup";

/// Caller-supplied secret.
pub enum Secret {
    /// Account identifier (crypt5).
    Account(Zeroizing<String>),
    /// Raw key file content (crypt7/8/12).
    KeyFile(Zeroizing<Vec<u8>>),
}

impl Secret {
    pub fn account(account: impl Into<String>) -> Self {
        Self::Account(Zeroizing::new(account.into()))
    }

    pub fn key_file(bytes: impl Into<Vec<u8>>) -> Self {
        Self::KeyFile(Zeroizing::new(bytes.into()))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(_) => f.write_str("Secret::Account(<redacted>)"),
            Self::KeyFile(b) => write!(f, "Secret::KeyFile(<{} bytes>)", b.len()),
        }
    }
}

/// Key-file fields a container header must agree with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyBinding {
    pub cipher_version: [u8; 2],
    pub key_version: u8,
    pub server_salt: [u8; 32],
    pub google_id_salt: [u8; 16],
}

/// Resolved key material for one session. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    #[zeroize(skip)]
    version: CryptVersion,
    key: [u8; 32],
    key_len: usize,
    iv: Option<[u8; 16]>,
    auth_key: Option<[u8; 32]>,
    #[zeroize(skip)]
    binding: Option<KeyBinding>,
}

impl KeyMaterial {
    pub fn version(&self) -> CryptVersion {
        self.version
    }

    /// Cipher key (24 bytes for crypt5, 32 otherwise).
    pub fn cipher_key(&self) -> &[u8] {
        &self.key[..self.key_len]
    }

    /// IV carried by the key file (crypt7).
    pub fn iv(&self) -> Option<&[u8; 16]> {
        self.iv.as_ref()
    }

    /// Separate authentication key for HMAC trailers.
    pub fn auth_key(&self) -> Option<&[u8; 32]> {
        self.auth_key.as_ref()
    }

    /// Check that a container header was written with this key file.
    ///
    /// Account-derived keys carry no binding and always pass.
    pub fn check_binding(&self, header: Option<&BackupHeader>) -> Result<()> {
        let (Some(binding), Some(header)) = (&self.binding, header) else {
            return Ok(());
        };

        let matches = header.cipher_version[..].ct_eq(&binding.cipher_version[..])
            & header.key_version.ct_eq(&binding.key_version)
            & header.server_salt[..].ct_eq(&binding.server_salt[..])
            & header.google_id_salt[..].ct_eq(&binding.google_id_salt[..]);

        if bool::from(matches) {
            Ok(())
        } else {
            Err(WaError::InvalidSecret {
                version: self.version,
                reason: KEY_BINDING_MISMATCH,
            })
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("version", &self.version)
            .field("key_len", &self.key_len)
            .field("has_iv", &self.iv.is_some())
            .field("has_auth_key", &self.auth_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Derive or unwrap the key material a profile needs.
///
/// The secret must be the kind the profile asks for; anything else is
/// [`WaError::MissingSecret`]. Nothing here touches the container.
pub fn resolve(profile: &VersionProfile, secret: Option<&Secret>) -> Result<KeyMaterial> {
    let version = profile.version;
    let material = match (profile.key_derivation, secret) {
        (KeyDerivation::AccountDerived, Some(Secret::Account(account))) if !account.is_empty() => {
            derive_account_key(version, account)
        }
        (KeyDerivation::AccountDerived, _) => {
            return Err(WaError::MissingSecret {
                version,
                required: "account name",
            });
        }
        (KeyDerivation::KeyFileUnwrapped, Some(Secret::KeyFile(bytes))) => {
            unwrap_key_file(version, bytes)?
        }
        (KeyDerivation::KeyFileUnwrapped, _) => {
            return Err(WaError::MissingSecret {
                version,
                required: "key file",
            });
        }
    };

    debug!(version = %version, key_len = material.key_len, "key material resolved");
    Ok(material)
}
