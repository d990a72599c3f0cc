use std::env;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::signal_handler::Mode;

/// Initial argument vector capacity; lines may still carry more.
pub const MAX_ARGS: usize = 512;

pub const BACKGROUND_MARKER: &str = "&";

/// One line of user input split into words. Never empty while it is being
/// dispatched: a blank line holds a single empty placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    raw_line: OsString,
    args: Vec<OsString>,
}

impl ParsedCommand {
    /// Splits `line` on runs of ASCII whitespace. In foreground-only mode a
    /// final `&` is dropped so the command runs in the foreground.
    pub fn parse(line: &[u8], mode: Mode) -> Self {
        let mut args = Vec::with_capacity(MAX_ARGS.min(line.len() / 2 + 1));
        args.extend(
            line.split(u8::is_ascii_whitespace)
                .filter(|word| !word.is_empty())
                .map(|word| OsStr::from_bytes(word).to_os_string()),
        );

        if mode == Mode::ForegroundOnly && args.len() > 1 && is_marker(args.last()) {
            args.pop();
        }

        if args.is_empty() {
            args.push(OsString::new());
        }

        let raw_line = line.strip_suffix(b"\n").unwrap_or(line);
        ParsedCommand {
            raw_line: OsStr::from_bytes(raw_line).to_os_string(),
            args,
        }
    }

    pub fn raw_line(&self) -> &OsStr {
        &self.raw_line
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn program(&self) -> &OsStr {
        self.args.first().map(OsString::as_os_str).unwrap_or_default()
    }

    /// Blank lines and `#` comments are no-ops.
    pub fn is_noop(&self) -> bool {
        let program = self.program().as_bytes();
        program.is_empty() || program.starts_with(b"#")
    }

    /// A trailing `&` after at least one other word.
    pub fn is_background(&self) -> bool {
        self.args.len() > 1 && is_marker(self.args.last())
    }

    /// The argument list without the background marker.
    fn into_argv(mut self) -> (Vec<OsString>, bool) {
        let background = self.is_background();
        if background {
            self.args.pop();
        }
        (self.args, background)
    }
}

fn is_marker(word: Option<&OsString>) -> bool {
    word.is_some_and(|word| word == BACKGROUND_MARKER)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Noop,
    Exit,
    Cd(Option<OsString>),
    Status,
    External { args: Vec<OsString>, background: bool },
}

impl Command {
    pub fn parse(parsed: ParsedCommand) -> Self {
        if parsed.is_noop() {
            return Command::Noop;
        }

        // Builtins run in the shell itself, so a trailing `&` means nothing to them.
        let (args, background) = parsed.into_argv();
        let builtin = match args[0].to_str() {
            Some("exit") => Some(Command::Exit),
            Some("cd") => Some(Command::Cd(args.get(1).cloned())),
            Some("status") => Some(Command::Status),
            _ => None,
        };
        builtin.unwrap_or(Command::External { args, background })
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Command::Exit | Command::Cd(_) | Command::Status)
    }
}

/// Directory `cd` should move to: the argument, else `$HOME`.
pub fn cd_target(arg: Option<&OsStr>, home: Option<OsString>) -> Option<PathBuf> {
    match arg {
        Some(dir) => Some(PathBuf::from(dir)),
        None => home.filter(|h| !h.is_empty()).map(PathBuf::from),
    }
}

/// Runs `cd`. Failures are reported and leave the working directory as it was.
pub fn change_directory(arg: Option<&OsStr>) {
    let Some(target) = cd_target(arg, env::var_os("HOME")) else {
        eprintln!("smallsh: cd: HOME: No such file or directory");
        return;
    };

    match env::set_current_dir(&target) {
        Ok(()) => tracing::debug!(dir = %target.display(), "changed directory"),
        Err(e) => {
            tracing::debug!(error = %e, "cd failed");
            eprintln!("smallsh: cd: {}: No such file or directory", target.display());
        }
    }
}
