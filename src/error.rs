use std::io;

use thiserror::Error;

/// Conditions that end the interpreter. Everything a user can cause with a
/// bad command line is reported in place and never reaches this type.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("cannot install signal handlers: {0}")]
    Signal(#[source] nix::Error),

    #[error("cannot read input: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
