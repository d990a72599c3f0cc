use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use thiserror::Error;

const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectType {
    StdinFrom(PathBuf),
    StdoutTo(PathBuf),
}

impl RedirectType {
    fn target_fd(&self) -> RawFd {
        match self {
            RedirectType::StdinFrom(_) => libc::STDIN_FILENO,
            RedirectType::StdoutTo(_) => libc::STDOUT_FILENO,
        }
    }

    fn path(&self) -> &Path {
        match self {
            RedirectType::StdinFrom(path) | RedirectType::StdoutTo(path) => path,
        }
    }

    /// `<` opens read-only; `>` creates or truncates with mode 0644.
    pub fn open(&self) -> Result<File, RedirectError> {
        let opened = match self {
            RedirectType::StdinFrom(path) => File::open(path),
            RedirectType::StdoutTo(path) => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o644)
                .open(path),
        };
        opened.map_err(|source| RedirectError::Open {
            path: self.path().to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("{}: No such file or directory", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("syntax error: expected filename after '{0}'")]
    MissingTarget(&'static str),

    #[error("cannot redirect: {0}")]
    Dup(#[source] io::Error),
}

/// The redirections found on one command line, in the order written.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Redirections {
    redirects: Vec<RedirectType>,
}

impl Redirections {
    /// Pulls `<` and `>` (never the program name itself) out of `args`.
    /// Everything from the first operator to the end is removed, so words
    /// after a redirection target do not reach the program.
    pub fn extract(args: &mut Vec<OsString>) -> Result<Self, RedirectError> {
        let mut redirects = Vec::new();
        let mut first = None;

        for i in 1..args.len() {
            let op = match args[i].to_str() {
                Some("<") => "<",
                Some(">") => ">",
                _ => continue,
            };
            first.get_or_insert(i);

            let path = args
                .get(i + 1)
                .map(PathBuf::from)
                .ok_or(RedirectError::MissingTarget(op))?;
            redirects.push(if op == "<" {
                RedirectType::StdinFrom(path)
            } else {
                RedirectType::StdoutTo(path)
            });
        }

        if let Some(first) = first {
            args.truncate(first);
        }
        Ok(Redirections { redirects })
    }

    pub fn redirects(&self) -> &[RedirectType] {
        &self.redirects
    }

    /// The list to apply. Background jobs get `/dev/null` for any stream
    /// left unredirected.
    pub fn plan(&self, background: bool) -> Vec<RedirectType> {
        let mut plan = Vec::with_capacity(self.redirects.len() + 2);
        if background {
            if !self.redirects.iter().any(|r| matches!(r, RedirectType::StdinFrom(_))) {
                plan.push(RedirectType::StdinFrom(PathBuf::from(DEV_NULL)));
            }
            if !self.redirects.iter().any(|r| matches!(r, RedirectType::StdoutTo(_))) {
                plan.push(RedirectType::StdoutTo(PathBuf::from(DEV_NULL)));
            }
        }
        plan.extend(self.redirects().iter().cloned());
        plan
    }

    /// Binds each file onto stdin/stdout in order; a later operator of the
    /// same kind replaces an earlier one. Only meant for a forked child.
    pub fn apply(&self, background: bool) -> Result<(), RedirectError> {
        for redirect in self.plan(background) {
            let file = redirect.open()?;
            bind(&file, redirect.target_fd())?;
        }
        Ok(())
    }
}

fn bind(file: &File, target: RawFd) -> Result<(), RedirectError> {
    // SAFETY: both descriptors are valid; `file` is closed on drop and the
    // duplicate survives exec.
    if unsafe { libc::dup2(file.as_raw_fd(), target) } == -1 {
        return Err(RedirectError::Dup(io::Error::last_os_error()));
    }
    Ok(())
}
