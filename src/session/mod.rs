//! Decode sessions: the whole pipeline behind one [`std::io::Read`].
//!
//! A [`DecodeSession`] selects the version and resolves the key when it is
//! created, so caller mistakes surface before any container byte is read.
//! The first read then consumes the container, frames it, checks the key
//! binding, verifies the trailer, decrypts in place and hands the plaintext
//! to the payload [`Inflater`]. Later reads pull decoded bytes from it.
//!
//! ```text
//! Init -> VersionSelected -> KeyResolved -> Framed -> Verifying/Decrypting -> Inflating -> Done
//!                                    \______________________________________________/
//!                                                       Failed
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use wa_crypt_stream::{session, DecodeOptions, Secret};
//!
//! let key = std::fs::read("key")?;
//! let mut s = session::open("msgstore.db.crypt12", DecodeOptions::new().with_secret(Secret::key_file(key)))?;
//! let mut out = std::fs::File::create("msgstore.db")?;
//! s.decode_to(&mut out)?;
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem;
use std::path::Path;

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::crypto::{cipher, integrity, resolve, KeyMaterial, Secret};
use crate::decompress::Inflater;
use crate::error::{Result, WaError};
use crate::file_media::BackupFile;
use crate::formats::{detect, CryptVersion, VersionProfile};
use crate::parsing::ContainerFrame;

/// Buffer size used by [`DecodeSession::decode_to`].
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Pipeline position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    VersionSelected,
    KeyResolved,
    Framed,
    Decrypting,
    Verifying,
    Inflating,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::VersionSelected => "version-selected",
            Self::KeyResolved => "key-resolved",
            Self::Framed => "framed",
            Self::Decrypting => "decrypting",
            Self::Verifying => "verifying",
            Self::Inflating => "inflating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Caller-side configuration of a session.
#[derive(Debug, Default)]
pub struct DecodeOptions {
    /// Explicit version; overrides inference from the file name.
    pub version: Option<CryptVersion>,
    /// Account name or key file, whichever the version needs.
    pub secret: Option<Secret>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: CryptVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn with_account(self, account: impl Into<String>) -> Self {
        self.with_secret(Secret::account(account))
    }

    pub fn with_key_file(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.with_secret(Secret::key_file(bytes))
    }
}

enum State<R> {
    /// `size_hint` is the expected container length, 0 if unknown.
    KeyResolved { source: R, key: KeyMaterial, size_hint: usize },
    Inflating(Inflater),
    Done,
    Failed(Stage),
}

/// One decryption of one container. Not restartable.
///
/// Reads after the end of stream return `Ok(0)`. Reads after a failure return
/// an error again; the session never resumes.
pub struct DecodeSession<R> {
    profile: &'static VersionProfile,
    state: State<R>,
}

impl<R> DecodeSession<R> {
    pub fn version(&self) -> CryptVersion {
        self.profile.version
    }

    pub fn profile(&self) -> &'static VersionProfile {
        self.profile
    }

    pub fn stage(&self) -> Stage {
        match self.state {
            State::KeyResolved { .. } => Stage::KeyResolved,
            State::Inflating(_) => Stage::Inflating,
            State::Done => Stage::Done,
            State::Failed(_) => Stage::Failed,
        }
    }

    /// Stage that raised the terminal error, if the session failed.
    pub fn failed_at(&self) -> Option<Stage> {
        match self.state {
            State::Failed(stage) => Some(stage),
            _ => None,
        }
    }
}

impl<R: Read> DecodeSession<R> {
    /// Select the version for `name` and resolve the key.
    ///
    /// `source` is not touched until the first read.
    pub fn new(name: &str, source: R, options: DecodeOptions) -> Result<Self> {
        let (profile, key) = select(name, options)?;
        Ok(Self::with_key(profile, source, key, 0))
    }

    fn with_key(
        profile: &'static VersionProfile,
        source: R,
        key: KeyMaterial,
        size_hint: usize,
    ) -> Self {
        Self {
            profile,
            state: State::KeyResolved { source, key, size_hint },
        }
    }

    /// Decode the whole stream into `writer` and return the byte count.
    pub fn decode_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64> {
        let mut buf = Zeroizing::new(vec![0u8; COPY_BUFFER_SIZE]);
        let mut total = 0u64;
        loop {
            let n = self.read_decoded(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            total += n as u64;
        }
        writer.flush()?;
        Ok(total)
    }

    /// Typed counterpart of [`Read::read`].
    pub fn read_decoded(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match mem::replace(&mut self.state, State::Failed(Stage::Init)) {
                State::KeyResolved { source, key, size_hint } => {
                    match prepare(self.profile, source, key, size_hint) {
                        Ok(inflater) => {
                            debug!(version = %self.profile.version, stage = %Stage::Inflating, "payload ready");
                            self.state = State::Inflating(inflater);
                        }
                        Err(e) => return Err(self.fail(e)),
                    }
                }
                State::Inflating(mut inflater) => {
                    return match inflater.read_chunk(buf) {
                        Ok(0) => {
                            debug!(
                                version = %self.profile.version,
                                stage = %Stage::Done,
                                total = inflater.total_out(),
                                "stream complete"
                            );
                            self.state = State::Done;
                            Ok(0)
                        }
                        Ok(n) => {
                            trace!(n, "decoded chunk");
                            self.state = State::Inflating(inflater);
                            Ok(n)
                        }
                        Err(e) => Err(self.fail(e)),
                    };
                }
                State::Done => {
                    self.state = State::Done;
                    return Ok(0);
                }
                State::Failed(stage) => {
                    self.state = State::Failed(stage);
                    return Err(WaError::Io(io::Error::other(format!(
                        "{}: decode session already failed at stage {stage}",
                        self.profile.version
                    ))));
                }
            }
        }
    }

    fn fail(&mut self, err: WaError) -> WaError {
        let stage = err.stage();
        debug!(version = %self.profile.version, %stage, error = %err, "session failed");
        self.state = State::Failed(stage);
        err
    }
}

impl<R: Read> Read for DecodeSession<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decoded(buf).map_err(WaError::into_io)
    }
}

impl<R> fmt::Debug for DecodeSession<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeSession")
            .field("version", &self.profile.version)
            .field("stage", &self.stage())
            .finish_non_exhaustive()
    }
}

fn select(name: &str, options: DecodeOptions) -> Result<(&'static VersionProfile, KeyMaterial)> {
    let profile = detect(name, options.version)?;
    debug!(version = %profile.version, stage = %Stage::VersionSelected, "version selected");
    let key = resolve(profile, options.secret.as_ref())?;
    debug!(version = %profile.version, stage = %Stage::KeyResolved, "key resolved");
    Ok((profile, key))
}

/// Read, frame, verify and decrypt the container. Consumes the source and the key.
///
/// The buffer is preallocated from `size_hint`; a wrong hint only costs reallocations.
fn prepare<R: Read>(
    profile: &VersionProfile,
    mut source: R,
    key: KeyMaterial,
    size_hint: usize,
) -> Result<Inflater> {
    let version = profile.version;
    let mut raw = Zeroizing::new(Vec::with_capacity(size_hint));
    source.read_to_end(&mut raw)?;
    drop(source);

    let frame = ContainerFrame::parse(profile, &raw)?;
    debug!(
        %version,
        stage = %Stage::Framed,
        container = raw.len(),
        ciphertext = frame.ciphertext.len(),
        "container framed"
    );
    key.check_binding(frame.header.as_ref())?;

    debug!(%version, stage = %Stage::Verifying, "checking integrity trailer");
    integrity::verify(profile, &key, frame.signed_region(&raw), frame.tag(&raw))?;

    debug!(%version, stage = %Stage::Decrypting, "decrypting");
    let iv = cipher::select_iv(profile, &key, &frame)?;
    let (head, tail) = raw.split_at_mut(frame.ciphertext.end);
    let tag = &tail[..frame.tag.len()];
    let plain_len = cipher::decrypt(profile, &key, &iv, &mut head[frame.ciphertext.start..], tag)?;
    drop(key);

    raw.truncate(frame.ciphertext.start + plain_len);
    raw.drain(..frame.ciphertext.start);
    debug!(%version, plaintext = raw.len(), "ciphertext decrypted");

    Inflater::new(profile, raw)
}

/// Open a backup on disk.
///
/// The version is taken from the file name (or `options`) and the key is
/// resolved before the file is opened, so an unknown extension or a missing
/// secret never touches the file. The handle is dropped once the container
/// has been consumed.
pub fn open(path: impl AsRef<Path>, options: DecodeOptions) -> Result<DecodeSession<File>> {
    let path = path.as_ref();
    let (profile, key) = select(&path.to_string_lossy(), options)?;
    let backup = BackupFile::open(path)?;
    debug!(name = backup.name(), length = backup.length(), "backup opened");
    let size_hint = usize::try_from(backup.length()).unwrap_or(0);
    Ok(DecodeSession::with_key(profile, backup.reader()?, key, size_hint))
}

/// Async counterpart of [`open`]: the container is loaded with tokio, then
/// decoded by a regular session over the in-memory bytes.
#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub async fn open_async(
    path: impl AsRef<Path>,
    options: DecodeOptions,
) -> Result<DecodeSession<io::Cursor<Vec<u8>>>> {
    let path = path.as_ref();
    let (profile, key) = select(&path.to_string_lossy(), options)?;
    let backup = BackupFile::open(path)?;
    let raw = backup.read_async().await?;
    let size_hint = raw.len();
    Ok(DecodeSession::with_key(profile, io::Cursor::new(raw), key, size_hint))
}
