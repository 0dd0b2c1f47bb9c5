//! crypt5 account-derived key.
//!
//! - MD5 of the account identifier (UTF-8)
//! - XORed, cycling, over a fixed 24-byte AES-192 key
//! - Fixed IV, see [`crate::formats::CRYPT5_IV`]

use super::KeyMaterial;
use crate::formats::CryptVersion;

/// Fixed crypt5 base key.
pub const CRYPT5_BASE_KEY: [u8; 24] = [
    0x8d, 0x4b, 0x15, 0x5c, 0xc9, 0xff, 0x81, 0xe5, 0xcb, 0xf6, 0xfa, 0x78, 0x19, 0x36, 0x6a, 0x3e,
    0xc6, 0x21, 0xa6, 0x56, 0x41, 0x6c, 0xd7, 0x93,
];

pub fn derive_account_key(version: CryptVersion, account: &str) -> KeyMaterial {
    let digest = md5::compute(account.as_bytes());

    let mut key = [0u8; 32];
    for (i, (out, base)) in key.iter_mut().zip(CRYPT5_BASE_KEY).enumerate() {
        *out = base ^ digest.0[i % 16];
    }

    KeyMaterial {
        version,
        key,
        key_len: CRYPT5_BASE_KEY.len(),
        iv: None,
        auth_key: None,
        binding: None,
    }
}
