//! `watools`: decrypt messenger backups from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};
use wa_crypt_stream::formats::KeyDerivation;
use wa_crypt_stream::{detect, open, CryptVersion, DecodeOptions, WaError};

/// Exit code for command-line usage errors (`EX_USAGE`), distinct from every
/// [`WaError::exit_code`].
const USAGE_EXIT_CODE: u8 = 64;

#[derive(Parser)]
#[command(name = "watools")]
#[command(about = "Decrypt encrypted messenger backups (crypt5, crypt7, crypt8, crypt12)")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt a backup into a plain SQLite database
    Decrypt(DecryptArgs),
}

#[derive(Args)]
struct DecryptArgs {
    /// Key file (crypt7, crypt8, crypt12)
    #[arg(short, long, env = "WATOOLS_KEYFILE")]
    keyfile: Option<PathBuf>,

    /// Account name (crypt5)
    #[arg(short, long, env = "WATOOLS_ACCOUNT")]
    account: Option<String>,

    /// Crypt version if it cannot be inferred from the file extension
    #[arg(short, long = "crypto", value_name = "VERSION")]
    crypto: Option<CryptVersion>,

    /// Encrypted backup
    dbfile: PathBuf,

    /// Where to write the decrypted database
    outfile: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    let result = match cli.command {
        Commands::Decrypt(args) => decrypt(&args),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(stage = %e.stage(), exit_code = e.exit_code(), "decrypt failed");
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Help and version requests exit cleanly, anything else is a usage error.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        USAGE_EXIT_CODE
    } else {
        0
    }
}

/// Pick the secret the backup's version needs; the other one is ignored.
fn decode_options(args: &DecryptArgs) -> Result<DecodeOptions, WaError> {
    let profile = detect(&args.dbfile.to_string_lossy(), args.crypto)?;
    let options = DecodeOptions::new().with_version(profile.version);

    Ok(match (profile.key_derivation, &args.account, &args.keyfile) {
        (KeyDerivation::AccountDerived, Some(account), _) => options.with_account(account.as_str()),
        (KeyDerivation::KeyFileUnwrapped, _, Some(path)) => {
            options.with_key_file(std::fs::read(path)?)
        }
        _ => options,
    })
}

fn decrypt(args: &DecryptArgs) -> Result<u64, WaError> {
    let mut session = open(&args.dbfile, decode_options(args)?)?;

    // Decode next to the destination and only rename on success.
    let dir = match args.outfile.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    debug!(tmp = %tmp.path().display(), "decoding into temporary file");

    let written = session.decode_to(tmp.as_file_mut())?;
    tmp.persist(&args.outfile).map_err(|e| WaError::Io(e.error))?;

    info!(
        version = %session.version(),
        bytes = written,
        out = %args.outfile.display(),
        "backup decrypted"
    );
    Ok(written)
}
