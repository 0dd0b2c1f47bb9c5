//! Streaming decryption of encrypted messenger backups.
//!
//! Recovers the original SQLite message store from crypt5, crypt7, crypt8 and
//! crypt12 containers. Each format is a static profile; a [`DecodeSession`]
//! drives detection, key resolution, framing, decryption, integrity checking
//! and decompression behind a plain [`std::io::Read`].
//!
//! ## Features
//! - Core library is synchronous and uses RustCrypto primitives only
//! - `async` - Async container loading with tokio
//! - `parallel` - Batch decoding on the rayon pool
//! - `cli` - The `watools` command-line tool
//!
//! ## Example
//!
//! ```rust,ignore
//! use wa_crypt_stream::{open, DecodeOptions};
//!
//! let opts = DecodeOptions::new().with_key_file(std::fs::read("key")?);
//! let mut session = open("msgstore.db.crypt12", opts)?;
//! session.decode_to(&mut std::fs::File::create("msgstore.db")?)?;
//! ```

pub mod crypto;
pub mod decompress;
pub mod error;
mod file_media;
pub mod formats;
pub mod parsing;
pub mod session;

#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
pub mod batch;

#[cfg(test)]
mod test_support;

pub use crypto::{KeyMaterial, Secret};
pub use error::{Result, WaError};
pub use file_media::BackupFile;
pub use formats::{detect, CryptVersion, VersionProfile};
pub use session::{open, DecodeOptions, DecodeSession, Stage};

#[cfg(feature = "async")]
pub use session::open_async;

#[cfg(feature = "parallel")]
pub use batch::decrypt_batch;
