//! Key file parser.
//!
//! The key file is a Java-serialized `byte[]` of 131 bytes:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 27 | Serialization prefix |
//! | 27 | 2 | Cipher header version (`00 01`) |
//! | 29 | 1 | Key version |
//! | 30 | 32 | Server salt |
//! | 62 | 16 | Google-id salt |
//! | 78 | 32 | Hashed key (SHA-256 of the cipher key) |
//! | 110 | 16 | IV |
//! | 126 | 32 | AES-256 cipher key |

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, WaError};
use crate::formats::CryptVersion;

/// Serialization stream header for a 131-byte `byte[]`.
pub const KEY_FILE_PREFIX: [u8; 27] = [
    0xAC, 0xED, 0x00, 0x05, 0x75, 0x72, 0x00, 0x02, 0x5B, 0x42, 0xAC, 0xF3, 0x17, 0xF8, 0x06, 0x08,
    0x54, 0xE0, 0x02, 0x00, 0x00, 0x78, 0x70, 0x00, 0x00, 0x00, 0x83,
];

/// The only cipher header version seen in key files and containers.
pub const CIPHER_HEADER_VERSION: [u8; 2] = [0x00, 0x01];

/// Fields of a parsed key file.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyFile {
    pub cipher_version: [u8; 2],
    pub key_version: u8,
    pub server_salt: [u8; 32],
    pub google_id_salt: [u8; 16],
    pub hashed_key: [u8; 32],
    pub iv: [u8; 16],
    pub key: [u8; 32],
}

impl std::fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFile")
            .field("cipher_version", &self.cipher_version)
            .field("key_version", &self.key_version)
            .finish_non_exhaustive()
    }
}

pub struct KeyFileParser;

impl KeyFileParser {
    pub const SIZE: usize = 158;

    /// Structural parse. `version` only labels errors.
    pub fn parse(version: CryptVersion, buffer: &[u8]) -> Result<KeyFile> {
        let invalid = |reason| WaError::InvalidSecret { version, reason };

        if buffer.len() != Self::SIZE {
            return Err(invalid("unexpected key file size"));
        }
        if buffer[..27] != KEY_FILE_PREFIX {
            return Err(invalid("missing key file marker"));
        }
        if buffer[27..29] != CIPHER_HEADER_VERSION {
            return Err(invalid("unsupported cipher header version"));
        }

        let mut key_file = KeyFile {
            cipher_version: [buffer[27], buffer[28]],
            key_version: buffer[29],
            server_salt: [0u8; 32],
            google_id_salt: [0u8; 16],
            hashed_key: [0u8; 32],
            iv: [0u8; 16],
            key: [0u8; 32],
        };
        key_file.server_salt.copy_from_slice(&buffer[30..62]);
        key_file.google_id_salt.copy_from_slice(&buffer[62..78]);
        key_file.hashed_key.copy_from_slice(&buffer[78..110]);
        key_file.iv.copy_from_slice(&buffer[110..126]);
        key_file.key.copy_from_slice(&buffer[126..158]);

        Ok(key_file)
    }
}
