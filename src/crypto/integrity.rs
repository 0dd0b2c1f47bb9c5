//! Standalone integrity trailers.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use super::KeyMaterial;
use crate::error::{Result, WaError};
use crate::formats::{TrailerKind, VersionProfile};

pub type HmacSha256 = Hmac<Sha256>;

/// Recompute the trailer tag over `signed_region` and compare in constant time.
///
/// Profiles without an HMAC trailer pass trivially; their integrity, if any,
/// comes from the cipher mode.
pub fn verify(
    profile: &VersionProfile,
    key: &KeyMaterial,
    signed_region: &[u8],
    tag: &[u8],
) -> Result<()> {
    if profile.trailer != TrailerKind::HmacTag {
        return Ok(());
    }

    let mismatch = || WaError::IntegrityMismatch {
        version: profile.version,
    };
    let auth_key = key.auth_key().ok_or_else(mismatch)?;

    let mut mac = <HmacSha256 as Mac>::new_from_slice(auth_key).map_err(|_| mismatch())?;
    mac.update(signed_region);
    mac.verify_slice(tag).map_err(|_| mismatch())?;

    debug!(version = %profile.version, signed = signed_region.len(), "integrity trailer verified");
    Ok(())
}
