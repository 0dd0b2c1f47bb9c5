//! Container format versions and their static profiles.
//!
//! Every supported backup format is one [`CryptVersion`] variant. Its algorithm
//! parameters live in a [`VersionProfile`] held in a process-wide, read-only
//! table, so dispatch is by value and never by trait object.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, WaError};

/// Supported encrypted container versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptVersion {
    /// AES-192-CBC, key derived from the account name.
    Crypt5,
    /// AES-256-CBC with an HMAC trailer, key from the key file.
    Crypt7,
    /// AES-256-GCM over a zlib stream, key from the key file.
    Crypt8,
    /// Like crypt8 with an extra account suffix in the footer.
    Crypt12,
}

impl CryptVersion {
    pub const ALL: [CryptVersion; 4] = [Self::Crypt5, Self::Crypt7, Self::Crypt8, Self::Crypt12];

    /// File extension (without the dot) that identifies this version.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Crypt5 => "crypt5",
            Self::Crypt7 => "crypt7",
            Self::Crypt8 => "crypt8",
            Self::Crypt12 => "crypt12",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.extension().eq_ignore_ascii_case(ext))
    }

    /// The static profile for this version.
    pub fn profile(self) -> &'static VersionProfile {
        match self {
            Self::Crypt5 => &PROFILES[0],
            Self::Crypt7 => &PROFILES[1],
            Self::Crypt8 => &PROFILES[2],
            Self::Crypt12 => &PROFILES[3],
        }
    }
}

impl fmt::Display for CryptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for CryptVersion {
    type Err = String;

    /// Accepts `crypt12`, `CRYPT12`, `.crypt12` or just `12`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        let lower = s.to_ascii_lowercase();
        let digits = lower.strip_prefix("crypt").unwrap_or(&lower);
        match digits {
            "5" => Ok(Self::Crypt5),
            "7" => Ok(Self::Crypt7),
            "8" => Ok(Self::Crypt8),
            "12" => Ok(Self::Crypt12),
            _ => Err(format!(
                "unknown crypt version {s:?} (expected one of crypt5, crypt7, crypt8, crypt12)"
            )),
        }
    }
}

/// Where the cipher key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    /// Hashed from the account identifier with fixed format constants.
    AccountDerived,
    /// Unwrapped from a separate key file.
    KeyFileUnwrapped,
}

/// Block cipher and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    Aes192Cbc,
    Aes256Cbc,
    /// AES-256-GCM with a 16-byte nonce and a 16-byte tag.
    Aes256Gcm,
}

impl CipherKind {
    /// Whether the mode authenticates the ciphertext itself.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Aes256Gcm)
    }

    /// Smallest ciphertext region the mode can decrypt.
    pub fn min_ciphertext(self) -> usize {
        match self {
            Self::Aes192Cbc | Self::Aes256Cbc => 16,
            Self::Aes256Gcm => 1,
        }
    }
}

/// Where the IV comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvSource {
    /// Fixed by the format.
    Constant([u8; 16]),
    /// Stored in the key file next to the key.
    KeyFile,
    /// Stored in the container header, see [`crate::parsing::BackupHeader`].
    Header,
}

/// What follows the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailerKind {
    None,
    /// HMAC-SHA256 over header and ciphertext, checked before decryption.
    HmacTag,
    /// The GCM tag, optionally followed by `extra` informational bytes.
    AeadTag { extra: usize },
}

impl TrailerKind {
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacTag => HMAC_TAG_LEN,
            Self::AeadTag { extra } => AEAD_TAG_LEN + extra,
        }
    }
}

/// How the decrypted payload encodes the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// The raw SQLite file.
    Stored,
    /// A zlib stream of the SQLite file.
    Zlib,
}

/// Immutable per-version algorithm parameters.
#[derive(Debug)]
pub struct VersionProfile {
    pub version: CryptVersion,
    pub key_derivation: KeyDerivation,
    pub cipher: CipherKind,
    pub iv_source: IvSource,
    pub header_len: usize,
    pub trailer: TrailerKind,
    pub payload: PayloadKind,
}

impl VersionProfile {
    /// Smallest container this profile can frame: header, minimum ciphertext and trailer.
    pub fn min_container_len(&self) -> usize {
        self.header_len + self.cipher.min_ciphertext() + self.trailer.size()
    }
}

/// Length of the shared crypt7/8/12 header.
pub const HEADER_LEN: usize = 67;
pub const HMAC_TAG_LEN: usize = 32;
pub const AEAD_TAG_LEN: usize = 16;
/// Account suffix appended to the crypt12 footer.
pub const ACCOUNT_SUFFIX_LEN: usize = 4;

/// Fixed crypt5 IV.
pub const CRYPT5_IV: [u8; 16] = [
    0x1e, 0x39, 0xf3, 0x69, 0xe9, 0x0d, 0xb3, 0x3a, 0xa7, 0x3b, 0x44, 0x2b, 0xbb, 0xb6, 0xb0, 0xb9,
];

/// Static profile table, one entry per [`CryptVersion`] in declaration order.
pub static PROFILES: [VersionProfile; 4] = [
    VersionProfile {
        version: CryptVersion::Crypt5,
        key_derivation: KeyDerivation::AccountDerived,
        cipher: CipherKind::Aes192Cbc,
        iv_source: IvSource::Constant(CRYPT5_IV),
        header_len: 0,
        trailer: TrailerKind::None,
        payload: PayloadKind::Stored,
    },
    VersionProfile {
        version: CryptVersion::Crypt7,
        key_derivation: KeyDerivation::KeyFileUnwrapped,
        cipher: CipherKind::Aes256Cbc,
        iv_source: IvSource::KeyFile,
        header_len: HEADER_LEN,
        trailer: TrailerKind::HmacTag,
        payload: PayloadKind::Stored,
    },
    VersionProfile {
        version: CryptVersion::Crypt8,
        key_derivation: KeyDerivation::KeyFileUnwrapped,
        cipher: CipherKind::Aes256Gcm,
        iv_source: IvSource::Header,
        header_len: HEADER_LEN,
        trailer: TrailerKind::AeadTag { extra: 0 },
        payload: PayloadKind::Zlib,
    },
    VersionProfile {
        version: CryptVersion::Crypt12,
        key_derivation: KeyDerivation::KeyFileUnwrapped,
        cipher: CipherKind::Aes256Gcm,
        iv_source: IvSource::Header,
        header_len: HEADER_LEN,
        trailer: TrailerKind::AeadTag { extra: ACCOUNT_SUFFIX_LEN },
        payload: PayloadKind::Zlib,
    },
];

/// Pick the profile for a container.
///
/// An explicit override always wins. Otherwise the last extension of `name`
/// decides (`msgstore.db.crypt12` is crypt12). Only the name is inspected.
pub fn detect(name: &str, version: Option<CryptVersion>) -> Result<&'static VersionProfile> {
    if let Some(v) = version {
        debug!(version = %v, "using explicit crypt version");
        return Ok(v.profile());
    }

    let profile = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(CryptVersion::from_extension)
        .map(CryptVersion::profile)
        .ok_or_else(|| WaError::UnknownVersion {
            name: name.to_string(),
        })?;

    debug!(version = %profile.version, name, "crypt version inferred from file name");
    Ok(profile)
}
