//! Positional parsers for containers and key files.

pub mod container;
pub mod key_file;

pub use container::{BackupHeader, ContainerFrame};
pub use key_file::{KeyFile, KeyFileParser};
