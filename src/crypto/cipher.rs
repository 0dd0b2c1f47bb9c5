//! Block decryption per profile.
//!
//! CBC modes strip and validate PKCS#7 padding. GCM authenticates before any
//! plaintext is kept: on a tag mismatch the buffer contents are undefined and
//! the caller gets [`WaError::CipherFailure`].

use aes::{Aes192, Aes256};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{AesGcm, Nonce, Tag};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};

use super::KeyMaterial;
use crate::error::{Result, WaError};
use crate::formats::{CipherKind, IvSource, VersionProfile, AEAD_TAG_LEN};
use crate::parsing::ContainerFrame;

type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
/// AES-256-GCM with the 16-byte nonce the header stores.
pub(crate) type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const CRYPT_BLOCK_SIZE: usize = 16;

/// Pick the IV the profile prescribes.
pub fn select_iv(profile: &VersionProfile, key: &KeyMaterial, frame: &ContainerFrame) -> Result<[u8; 16]> {
    let iv = match profile.iv_source {
        IvSource::Constant(iv) => Some(iv),
        IvSource::KeyFile => key.iv().copied(),
        IvSource::Header => frame.embedded_iv().copied(),
    };
    iv.ok_or(WaError::CipherFailure {
        version: profile.version,
        reason: "no IV available",
    })
}

/// Decrypt `data` in place and return the plaintext length.
///
/// `tag` is only read for authenticated modes.
pub fn decrypt(
    profile: &VersionProfile,
    key: &KeyMaterial,
    iv: &[u8; 16],
    data: &mut [u8],
    tag: &[u8],
) -> Result<usize> {
    let fail = |reason| WaError::CipherFailure {
        version: profile.version,
        reason,
    };

    match profile.cipher {
        CipherKind::Aes192Cbc | CipherKind::Aes256Cbc => {
            if data.is_empty() || data.len() % CRYPT_BLOCK_SIZE != 0 {
                return Err(fail("ciphertext is not a whole number of blocks"));
            }
            let plain = if profile.cipher == CipherKind::Aes192Cbc {
                Aes192CbcDec::new_from_slices(key.cipher_key(), iv)
                    .map_err(|_| fail("bad key length"))?
                    .decrypt_padded_mut::<Pkcs7>(data)
            } else {
                Aes256CbcDec::new_from_slices(key.cipher_key(), iv)
                    .map_err(|_| fail("bad key length"))?
                    .decrypt_padded_mut::<Pkcs7>(data)
            };
            plain
                .map(|p| p.len())
                .map_err(|_| fail("invalid padding, wrong key or corrupt backup"))
        }
        CipherKind::Aes256Gcm => {
            if tag.len() != AEAD_TAG_LEN {
                return Err(fail("missing authentication tag"));
            }
            let cipher =
                Aes256Gcm16::new_from_slice(key.cipher_key()).map_err(|_| fail("bad key length"))?;
            cipher
                .decrypt_in_place_detached(
                    Nonce::<U16>::from_slice(iv),
                    b"",
                    data,
                    Tag::<U16>::from_slice(tag),
                )
                .map_err(|_| fail("authentication tag mismatch, wrong key or corrupt backup"))?;
            Ok(data.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{resolve, Secret};
    use crate::formats::CryptVersion;
    use crate::formats::CRYPT5_IV;
    use crate::test_support::{
        build_container, cbc_encrypt, gcm_encrypt, key_file_bytes, secret_for, sqlite_fixture,
        TEST_IV, TEST_KEY, TEST_NONCE,
    };

    fn key_file_material(v: CryptVersion) -> KeyMaterial {
        resolve(v.profile(), Some(&Secret::key_file(key_file_bytes()))).unwrap()
    }

    #[test]
    fn test_cbc_round_trip() {
        let km = key_file_material(CryptVersion::Crypt7);
        let mut data = cbc_encrypt(&TEST_KEY, &TEST_IV, b"hello, database");
        assert_eq!(data.len(), 16);
        let n = decrypt(CryptVersion::Crypt7.profile(), &km, &TEST_IV, &mut data, &[]).unwrap();
        assert_eq!(&data[..n], b"hello, database");
    }

    #[test]
    fn test_cbc_rejects_partial_block() {
        let km = key_file_material(CryptVersion::Crypt7);
        let mut data = vec![0u8; 17];
        assert!(matches!(
            decrypt(CryptVersion::Crypt7.profile(), &km, &TEST_IV, &mut data, &[]),
            Err(WaError::CipherFailure { .. })
        ));
    }

    #[test]
    fn test_cbc_bad_padding() {
        let km = key_file_material(CryptVersion::Crypt7);
        let mut data = cbc_encrypt(&TEST_KEY, &TEST_IV, &[0x42; 32]);
        // Corrupting the second-to-last block flips the padding byte of the last one.
        let idx = data.len() - 17;
        data[idx] ^= 0x40;
        assert!(matches!(
            decrypt(CryptVersion::Crypt7.profile(), &km, &TEST_IV, &mut data, &[]),
            Err(WaError::CipherFailure { .. })
        ));
    }

    #[test]
    fn test_gcm_tag_checked() {
        let km = key_file_material(CryptVersion::Crypt12);
        let nonce = [7u8; 16];
        let (mut data, tag) = gcm_encrypt(&TEST_KEY, &nonce, b"zlib bytes");
        let mut copy = data.clone();

        let n = decrypt(CryptVersion::Crypt12.profile(), &km, &nonce, &mut data, &tag).unwrap();
        assert_eq!(&data[..n], b"zlib bytes");

        copy[0] ^= 1;
        assert!(matches!(
            decrypt(CryptVersion::Crypt12.profile(), &km, &nonce, &mut copy, &tag),
            Err(WaError::CipherFailure { .. })
        ));
    }

    #[test]
    fn test_gcm_requires_tag() {
        let km = key_file_material(CryptVersion::Crypt8);
        let mut data = vec![1u8; 8];
        assert!(decrypt(CryptVersion::Crypt8.profile(), &km, &[0; 16], &mut data, &[0; 4]).is_err());
    }

    #[test]
    fn test_iv_follows_profile() {
        let db = sqlite_fixture(256);
        let cases = [
            (CryptVersion::Crypt5, CRYPT5_IV),
            (CryptVersion::Crypt7, TEST_IV),
            (CryptVersion::Crypt8, TEST_NONCE),
            (CryptVersion::Crypt12, TEST_NONCE),
        ];
        for (v, expected) in cases {
            let profile = v.profile();
            let km = resolve(profile, Some(&secret_for(v))).unwrap();
            let raw = build_container(v, &db);
            let frame = ContainerFrame::parse(profile, &raw).unwrap();
            assert_eq!(select_iv(profile, &km, &frame).unwrap(), expected, "{v}");
        }
    }
}
