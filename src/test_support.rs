//! Fixture builders for tests: key files and encrypted containers for every
//! version, produced with the same RustCrypto primitives the decoder uses.

use std::io::Write;

use aes::{Aes192, Aes256};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Nonce;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hmac::Mac;
use sha2::{Digest, Sha256};

use crate::crypto::cipher::Aes256Gcm16;
use crate::crypto::integrity::HmacSha256;
use crate::crypto::{derive_account_key, Secret};
use crate::formats::{CryptVersion, CRYPT5_IV, HEADER_LEN};
use crate::parsing::key_file::{CIPHER_HEADER_VERSION, KEY_FILE_PREFIX};
use crate::parsing::BackupHeader;

pub const TEST_KEY: [u8; 32] = [
    0x60, 0x3d, 0xeb, 0x10, 0x15, 0xca, 0x71, 0xbe, 0x2b, 0x73, 0xae, 0xf0, 0x85, 0x7d, 0x77, 0x81,
    0x1f, 0x35, 0x2c, 0x07, 0x3b, 0x61, 0x08, 0xd7, 0x2d, 0x98, 0x10, 0xa3, 0x09, 0x14, 0xdf, 0xf4,
];
pub const TEST_IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
pub const TEST_NONCE: [u8; 16] = [0xC3; 16];
pub const TEST_ACCOUNT: &str = "31612345678";
pub const TEST_KEY_VERSION: u8 = 0x01;
pub const TEST_SERVER_SALT: [u8; 32] = [0x5A; 32];
pub const TEST_GOOGLE_SALT: [u8; 16] = [0xA5; 16];

/// A valid key file for [`TEST_KEY`].
pub fn key_file_bytes() -> Vec<u8> {
    let mut buf = KEY_FILE_PREFIX.to_vec();
    buf.extend_from_slice(&CIPHER_HEADER_VERSION);
    buf.push(TEST_KEY_VERSION);
    buf.extend_from_slice(&TEST_SERVER_SALT);
    buf.extend_from_slice(&TEST_GOOGLE_SALT);
    buf.extend_from_slice(&Sha256::digest(TEST_KEY));
    buf.extend_from_slice(&TEST_IV);
    buf.extend_from_slice(&TEST_KEY);
    buf
}

/// The header a container written with [`key_file_bytes`] carries.
pub fn header_for_key_file() -> BackupHeader {
    BackupHeader {
        cipher_version: CIPHER_HEADER_VERSION,
        key_version: TEST_KEY_VERSION,
        server_salt: TEST_SERVER_SALT,
        google_id_salt: TEST_GOOGLE_SALT,
        iv: TEST_NONCE,
    }
}

fn header_bytes() -> Vec<u8> {
    let h = header_for_key_file();
    let mut buf = h.cipher_version.to_vec();
    buf.push(h.key_version);
    buf.extend_from_slice(&h.server_salt);
    buf.extend_from_slice(&h.google_id_salt);
    buf.extend_from_slice(&h.iv);
    assert_eq!(buf.len(), HEADER_LEN);
    buf
}

fn pad_buffer(msg: &[u8]) -> (Vec<u8>, usize) {
    let mut buf = vec![0u8; msg.len() + 16];
    buf[..msg.len()].copy_from_slice(msg);
    (buf, msg.len())
}

/// AES-256-CBC with PKCS#7.
pub fn cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], msg: &[u8]) -> Vec<u8> {
    let (mut buf, len) = pad_buffer(msg);
    let n = cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_mut::<Pkcs7>(&mut buf, len)
        .unwrap()
        .len();
    buf.truncate(n);
    buf
}

/// AES-192-CBC with PKCS#7.
pub fn cbc192_encrypt(key: &[u8], iv: &[u8; 16], msg: &[u8]) -> Vec<u8> {
    let (mut buf, len) = pad_buffer(msg);
    let n = cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_mut::<Pkcs7>(&mut buf, len)
        .unwrap()
        .len();
    buf.truncate(n);
    buf
}

/// AES-256-GCM with a 16-byte nonce; returns ciphertext and detached tag.
pub fn gcm_encrypt(key: &[u8; 32], nonce: &[u8; 16], msg: &[u8]) -> (Vec<u8>, [u8; 16]) {
    let mut buf = msg.to_vec();
    let tag = Aes256Gcm16::new_from_slice(key)
        .unwrap()
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(nonce), b"", &mut buf)
        .unwrap();
    (buf, tag.into())
}

/// HMAC-SHA256 keyed with SHA-256 of [`TEST_KEY`].
pub fn hmac_tag(region: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&Sha256::digest(TEST_KEY)).unwrap();
    mac.update(region);
    mac.finalize().into_bytes().into()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A synthetic database image: SQLite magic followed by deterministic filler.
pub fn sqlite_fixture(len: usize) -> Vec<u8> {
    let mut db = b"SQLite format 3\0".to_vec();
    let mut state: u32 = 0x2545_F491;
    while db.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        // Half the pages are mostly zero so zlib has something to compress.
        let byte = if (db.len() / 4096) % 2 == 0 { 0 } else { state as u8 };
        db.push(byte);
    }
    db.truncate(len.max(16));
    db
}

/// The secret each version expects for the fixtures.
pub fn secret_for(version: CryptVersion) -> Secret {
    match version {
        CryptVersion::Crypt5 => Secret::account(TEST_ACCOUNT),
        _ => Secret::key_file(key_file_bytes()),
    }
}

/// Encrypt `db` into a complete container of the given version.
pub fn build_container(version: CryptVersion, db: &[u8]) -> Vec<u8> {
    match version {
        CryptVersion::Crypt5 => {
            let key = derive_account_key(version, TEST_ACCOUNT);
            cbc192_encrypt(key.cipher_key(), &CRYPT5_IV, db)
        }
        CryptVersion::Crypt7 => {
            let mut raw = header_bytes();
            raw.extend_from_slice(&cbc_encrypt(&TEST_KEY, &TEST_IV, db));
            let tag = hmac_tag(&raw);
            raw.extend_from_slice(&tag);
            raw
        }
        CryptVersion::Crypt8 | CryptVersion::Crypt12 => {
            let mut raw = header_bytes();
            let (ct, tag) = gcm_encrypt(&TEST_KEY, &TEST_NONCE, &zlib(db));
            raw.extend_from_slice(&ct);
            raw.extend_from_slice(&tag);
            if version == CryptVersion::Crypt12 {
                raw.extend_from_slice(b"5678");
            }
            raw
        }
    }
}
