//! Container frame parser.
//!
//! Splits a raw container into header, ciphertext and trailer regions using
//! the fixed layout of its profile. No cryptographic work happens here.
//!
//! Shared crypt7/8/12 header layout (67 bytes):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | Cipher header version (`00 01`) |
//! | 2 | 1 | Key version |
//! | 3 | 32 | Server salt |
//! | 35 | 16 | Google-id salt |
//! | 51 | 16 | IV / nonce |

use std::ops::Range;

use crate::error::{Result, WaError};
use crate::formats::{TrailerKind, VersionProfile, AEAD_TAG_LEN, HEADER_LEN};

/// Decoded fields of the 67-byte container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHeader {
    pub cipher_version: [u8; 2],
    pub key_version: u8,
    pub server_salt: [u8; 32],
    pub google_id_salt: [u8; 16],
    pub iv: [u8; 16],
}

impl BackupHeader {
    fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_LEN);
        let mut server_salt = [0u8; 32];
        server_salt.copy_from_slice(&buf[3..35]);
        let mut google_id_salt = [0u8; 16];
        google_id_salt.copy_from_slice(&buf[35..51]);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&buf[51..67]);

        Self {
            cipher_version: [buf[0], buf[1]],
            key_version: buf[2],
            server_salt,
            google_id_salt,
            iv,
        }
    }
}

/// Region boundaries of one container.
///
/// Regions are byte ranges into the raw container so the ciphertext can later
/// be decrypted in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFrame {
    pub header: Option<BackupHeader>,
    pub ciphertext: Range<usize>,
    /// Authentication tag (HMAC or GCM), empty when the format has none.
    pub tag: Range<usize>,
    /// Informational footer bytes after the tag (crypt12 account suffix).
    pub suffix: Range<usize>,
}

impl ContainerFrame {
    /// Apply the profile's layout to `raw`.
    pub fn parse(profile: &VersionProfile, raw: &[u8]) -> Result<Self> {
        let needed = profile.min_container_len();
        if raw.len() < needed {
            return Err(WaError::TruncatedContainer {
                version: profile.version,
                needed,
                have: raw.len(),
            });
        }

        let header = (profile.header_len > 0).then(|| BackupHeader::parse(&raw[..profile.header_len]));

        let trailer_start = raw.len() - profile.trailer.size();
        let tag_len = match profile.trailer {
            TrailerKind::None => 0,
            TrailerKind::HmacTag => profile.trailer.size(),
            TrailerKind::AeadTag { .. } => AEAD_TAG_LEN,
        };

        Ok(Self {
            header,
            ciphertext: profile.header_len..trailer_start,
            tag: trailer_start..trailer_start + tag_len,
            suffix: trailer_start + tag_len..raw.len(),
        })
    }

    pub fn ciphertext<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        &raw[self.ciphertext.clone()]
    }

    pub fn tag<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        &raw[self.tag.clone()]
    }

    /// Everything an HMAC trailer covers: header and ciphertext.
    pub fn signed_region<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        &raw[..self.ciphertext.end]
    }

    /// The account suffix stored in the footer, if the format carries one.
    pub fn account_suffix<'a>(&self, raw: &'a [u8]) -> Option<&'a [u8]> {
        (!self.suffix.is_empty()).then(|| &raw[self.suffix.clone()])
    }

    /// IV embedded in the header, if any.
    pub fn embedded_iv(&self) -> Option<&[u8; 16]> {
        self.header.as_ref().map(|h| &h.iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::CryptVersion;

    fn sample_header() -> Vec<u8> {
        let mut h = vec![0x00, 0x01, 0x02];
        h.extend_from_slice(&[0xAA; 32]);
        h.extend_from_slice(&[0xBB; 16]);
        h.extend_from_slice(&(0u8..16).collect::<Vec<_>>());
        assert_eq!(h.len(), HEADER_LEN);
        h
    }

    #[test]
    fn test_crypt5_has_no_header_or_trailer() {
        let raw = vec![0u8; 48];
        let frame = ContainerFrame::parse(CryptVersion::Crypt5.profile(), &raw).unwrap();
        assert!(frame.header.is_none());
        assert_eq!(frame.ciphertext, 0..48);
        assert!(frame.tag.is_empty());
        assert!(frame.account_suffix(&raw).is_none());
    }

    #[test]
    fn test_crypt7_layout() {
        let mut raw = sample_header();
        raw.extend_from_slice(&[1u8; 32]);
        raw.extend_from_slice(&[9u8; 32]);
        let frame = ContainerFrame::parse(CryptVersion::Crypt7.profile(), &raw).unwrap();

        assert_eq!(frame.ciphertext, 67..99);
        assert_eq!(frame.tag(&raw), &[9u8; 32]);
        assert_eq!(frame.signed_region(&raw).len(), 99);
        let header = frame.header.unwrap();
        assert_eq!(header.cipher_version, [0x00, 0x01]);
        assert_eq!(header.key_version, 0x02);
        assert_eq!(header.server_salt, [0xAA; 32]);
        assert_eq!(header.google_id_salt, [0xBB; 16]);
    }

    #[test]
    fn test_crypt12_footer_split() {
        let mut raw = sample_header();
        raw.extend_from_slice(&[7u8; 100]);
        raw.extend_from_slice(&[5u8; 16]);
        raw.extend_from_slice(b"4321");
        let frame = ContainerFrame::parse(CryptVersion::Crypt12.profile(), &raw).unwrap();

        assert_eq!(frame.ciphertext(&raw), &[7u8; 100]);
        assert_eq!(frame.tag(&raw), &[5u8; 16]);
        assert_eq!(frame.account_suffix(&raw), Some(&b"4321"[..]));
        assert_eq!(frame.embedded_iv().unwrap()[15], 15);
    }

    #[test]
    fn test_crypt8_footer_is_tag_only() {
        let mut raw = sample_header();
        raw.extend_from_slice(&[7u8; 10]);
        raw.extend_from_slice(&[5u8; 16]);
        let frame = ContainerFrame::parse(CryptVersion::Crypt8.profile(), &raw).unwrap();
        assert_eq!(frame.ciphertext, 67..77);
        assert_eq!(frame.tag, 77..93);
        assert!(frame.account_suffix(&raw).is_none());
    }

    #[test]
    fn test_truncated_containers() {
        for v in CryptVersion::ALL {
            let profile = v.profile();
            for len in [0, 1, profile.min_container_len() - 1] {
                let raw = vec![0u8; len];
                match ContainerFrame::parse(profile, &raw) {
                    Err(WaError::TruncatedContainer { version, needed, have }) => {
                        assert_eq!(version, v);
                        assert_eq!(needed, profile.min_container_len());
                        assert_eq!(have, len);
                    }
                    other => panic!("{v}: expected truncation, got {other:?}"),
                }
            }
            let raw = vec![0u8; profile.min_container_len()];
            assert!(ContainerFrame::parse(profile, &raw).is_ok());
        }
    }
}
