//! Payload decoding: turning decrypted bytes into the database stream.
//!
//! | Payload | Versions | Handling |
//! |---------|----------|----------|
//! | Stored | crypt5, crypt7 | Passed through after a SQLite magic check |
//! | Zlib | crypt8, crypt12 | Inflated incrementally, Adler-32 verified |
//!
//! The [`Inflater`] owns the decrypted buffer and wipes it on drop. It is
//! pull-based: each [`Inflater::read_chunk`] call produces at most one output
//! buffer's worth of data, so corruption deep inside the stream surfaces only
//! when reading reaches it.

use flate2::{Decompress, FlushDecompress, Status};
use tracing::{trace, warn};
use zeroize::Zeroizing;

use crate::error::{Result, WaError};
use crate::formats::{CryptVersion, PayloadKind, VersionProfile};

/// First 16 bytes of every SQLite 3 database file.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

enum Mode {
    Stored,
    Zlib(Box<Decompress>),
}

/// Pull-based decoder over a decrypted payload. Not restartable.
pub struct Inflater {
    version: CryptVersion,
    mode: Mode,
    input: Zeroizing<Vec<u8>>,
    pos: usize,
    finished: bool,
}

impl Inflater {
    /// Wrap a decrypted payload.
    ///
    /// Stored payloads are rejected up front unless they start with the SQLite
    /// magic; zlib payloads are checked as they are inflated.
    pub fn new(profile: &VersionProfile, input: Zeroizing<Vec<u8>>) -> Result<Self> {
        let mode = match profile.payload {
            PayloadKind::Stored => {
                if !input.starts_with(SQLITE_MAGIC) {
                    return Err(WaError::DecompressionFailure {
                        version: profile.version,
                        reason: "payload is not a SQLite database".into(),
                    });
                }
                Mode::Stored
            }
            PayloadKind::Zlib => Mode::Zlib(Box::new(Decompress::new(true))),
        };

        Ok(Self {
            version: profile.version,
            mode,
            input,
            pos: 0,
            finished: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Total decoded bytes produced so far.
    pub fn total_out(&self) -> u64 {
        match &self.mode {
            Mode::Stored => self.pos as u64,
            Mode::Zlib(z) => z.total_out(),
        }
    }

    /// Fill `out` with the next decoded bytes. `Ok(0)` means end of stream.
    pub fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.finished || out.is_empty() {
            return Ok(0);
        }

        match &mut self.mode {
            Mode::Stored => {
                let rest = &self.input[self.pos..];
                let n = rest.len().min(out.len());
                out[..n].copy_from_slice(&rest[..n]);
                self.pos += n;
                if n == 0 {
                    self.finished = true;
                }
                Ok(n)
            }
            Mode::Zlib(z) => loop {
                let before_in = z.total_in();
                let before_out = z.total_out();
                let status = z
                    .decompress(&self.input[self.pos..], out, FlushDecompress::None)
                    .map_err(|e| WaError::DecompressionFailure {
                        version: self.version,
                        reason: e.to_string(),
                    })?;
                let consumed = (z.total_in() - before_in) as usize;
                let produced = (z.total_out() - before_out) as usize;
                self.pos += consumed;
                trace!(consumed, produced, "inflate step");

                if status == Status::StreamEnd {
                    self.finished = true;
                    let trailing = self.input.len() - self.pos;
                    if trailing > 0 {
                        warn!(version = %self.version, trailing, "ignoring bytes after end of zlib stream");
                    }
                    return Ok(produced);
                }
                if produced > 0 {
                    return Ok(produced);
                }
                if consumed == 0 {
                    let reason = if self.pos >= self.input.len() {
                        "zlib stream ends before its final block"
                    } else {
                        "zlib stream made no progress"
                    };
                    return Err(WaError::DecompressionFailure {
                        version: self.version,
                        reason: reason.into(),
                    });
                }
            },
        }
    }
}
