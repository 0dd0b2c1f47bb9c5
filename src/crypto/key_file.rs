//! Key file unwrapping for crypt7/8/12.
//!
//! After the structural parse the key is only accepted if the stored hashed
//! key equals SHA-256 of the cipher key. The hashed key doubles as the HMAC
//! key for crypt7 trailers.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{KeyBinding, KeyMaterial};
use crate::error::{Result, WaError};
use crate::formats::CryptVersion;
use crate::parsing::KeyFileParser;

pub fn unwrap_key_file(version: CryptVersion, bytes: &[u8]) -> Result<KeyMaterial> {
    let key_file = KeyFileParser::parse(version, bytes)?;

    let digest = Sha256::digest(key_file.key);
    if !bool::from(digest.as_slice().ct_eq(&key_file.hashed_key[..])) {
        return Err(WaError::InvalidSecret {
            version,
            reason: "key checksum mismatch",
        });
    }

    Ok(KeyMaterial {
        version,
        key: key_file.key,
        key_len: key_file.key.len(),
        iv: Some(key_file.iv),
        auth_key: Some(key_file.hashed_key),
        binding: Some(KeyBinding {
            cipher_version: key_file.cipher_version,
            key_version: key_file.key_version,
            server_salt: key_file.server_salt,
            google_id_salt: key_file.google_id_salt,
        }),
    })
}
