//! Error types for backup decoding.
//!
//! This module provides the [`WaError`] type which covers every way a decode
//! session can fail. All of them are terminal for the session that raised them.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Caller | [`UnknownVersion`], [`MissingSecret`], [`InvalidSecret`] | Wrong or missing version/secret |
//! | Container | [`TruncatedContainer`] | File too short for its format |
//! | Crypto | [`CipherFailure`], [`IntegrityMismatch`] | Wrong key or tampered data |
//! | Payload | [`DecompressionFailure`] | Decrypted bytes are not a database |
//! | I/O | [`Io`] | Reading the container failed |
//!
//! ## Example
//!
//! ```rust,ignore
//! use wa_crypt_stream::{session, WaError};
//!
//! match session::open("msgstore.db.crypt12", opts) {
//!     Ok(mut s) => { s.decode_to(&mut out)?; }
//!     Err(WaError::UnknownVersion { .. }) => eprintln!("pass --crypto"),
//!     Err(e) => std::process::exit(e.exit_code().into()),
//! }
//! ```
//!
//! [`UnknownVersion`]: WaError::UnknownVersion
//! [`MissingSecret`]: WaError::MissingSecret
//! [`InvalidSecret`]: WaError::InvalidSecret
//! [`TruncatedContainer`]: WaError::TruncatedContainer
//! [`CipherFailure`]: WaError::CipherFailure
//! [`IntegrityMismatch`]: WaError::IntegrityMismatch
//! [`DecompressionFailure`]: WaError::DecompressionFailure
//! [`Io`]: WaError::Io

use std::io;

use thiserror::Error;

use crate::crypto::KEY_BINDING_MISMATCH;
use crate::formats::CryptVersion;
use crate::session::Stage;

/// Error type for backup decoding.
///
/// Messages name the stage and the container version involved. They never
/// contain key bytes, account identifiers or plaintext.
#[derive(Debug, Error)]
pub enum WaError {
    /// No version override was given and the file name does not map to a format.
    #[error("cannot determine crypt version of {name:?}; specify it explicitly")]
    UnknownVersion {
        /// The file name that was inspected.
        name: String,
    },

    /// The secret this version needs was not supplied.
    #[error("{version}: {required} is required")]
    MissingSecret {
        version: CryptVersion,
        /// Human readable name of the required secret ("account name", "key file").
        required: &'static str,
    },

    /// The key file failed its structural checks or does not belong to the backup.
    #[error("{version}: invalid key file: {reason}")]
    InvalidSecret {
        version: CryptVersion,
        reason: &'static str,
    },

    /// The container is shorter than its format's minimum size.
    #[error("{version}: container truncated: need at least {needed} bytes, have {have}")]
    TruncatedContainer {
        version: CryptVersion,
        needed: usize,
        have: usize,
    },

    /// Block decryption failed (bad padding, bad length or authentication tag mismatch).
    #[error("{version}: decryption failed: {reason}")]
    CipherFailure {
        version: CryptVersion,
        reason: &'static str,
    },

    /// The standalone integrity trailer does not match the container.
    #[error("{version}: integrity check failed, backup is corrupt or the key is wrong")]
    IntegrityMismatch { version: CryptVersion },

    /// The decrypted payload is not a valid database stream.
    #[error("{version}: decompression failed: {reason}")]
    DecompressionFailure {
        version: CryptVersion,
        reason: String,
    },

    /// Reading the container failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WaError {
    /// Pipeline stage in which this error is raised.
    pub fn stage(&self) -> Stage {
        match self {
            Self::UnknownVersion { .. } => Stage::Init,
            // Binding is checked against the header, after framing.
            Self::InvalidSecret { reason, .. } if *reason == KEY_BINDING_MISMATCH => Stage::Framed,
            Self::MissingSecret { .. } | Self::InvalidSecret { .. } => Stage::VersionSelected,
            Self::TruncatedContainer { .. } | Self::Io(_) => Stage::KeyResolved,
            Self::CipherFailure { .. } => Stage::Decrypting,
            Self::IntegrityMismatch { .. } => Stage::Verifying,
            Self::DecompressionFailure { .. } => Stage::Inflating,
        }
    }

    /// Container version the error refers to, if one had been selected.
    pub fn version(&self) -> Option<CryptVersion> {
        match self {
            Self::UnknownVersion { .. } | Self::Io(_) => None,
            Self::MissingSecret { version, .. }
            | Self::InvalidSecret { version, .. }
            | Self::TruncatedContainer { version, .. }
            | Self::CipherFailure { version, .. }
            | Self::IntegrityMismatch { version }
            | Self::DecompressionFailure { version, .. } => Some(*version),
        }
    }

    /// Distinct non-zero process exit code for each failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Io(_) => 1,
            Self::UnknownVersion { .. } => 2,
            Self::MissingSecret { .. } => 3,
            Self::InvalidSecret { .. } => 4,
            Self::TruncatedContainer { .. } => 5,
            Self::CipherFailure { .. } => 6,
            Self::IntegrityMismatch { .. } => 7,
            Self::DecompressionFailure { .. } => 8,
        }
    }

    /// Wrap for the [`std::io::Read`] boundary.
    ///
    /// Plain I/O errors pass through unchanged; everything else is boxed so
    /// [`WaError::from_io`] can recover it.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }

    /// Recover a typed error from an [`io::Error`] produced by [`WaError::into_io`].
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<WaError>()) {
            return Self::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<WaError>()) {
            Some(Ok(wa)) => *wa,
            Some(Err(inner)) => Self::Io(io::Error::new(kind, inner)),
            None => Self::Io(kind.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WaError>;
