//! Forking and exec'ing external programs.
//!
//! The parent is single-threaded, so the child may allocate and print
//! between `fork` and `execvp` the way a C shell would.

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::fmt;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::process;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execvp, fork, ForkResult, Pid};

use crate::error::{Result, ShellError};
use crate::redirects::Redirections;
use crate::signal_handler;

/// How a child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Exited(i32),
    Signaled(i32),
}

impl Default for Status {
    fn default() -> Self {
        Status::Exited(0)
    }
}

impl Status {
    /// `None` for state changes that are not termination. The kind comes from
    /// the wait status itself, so a SIGHUP death stays distinct from `exit 1`.
    pub fn from_wait(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Status::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Status::Signaled(signal as i32)),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exited(code) => write!(f, "exit value {code}"),
            Status::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Runs `args` and blocks until it terminates. A signal death is announced
/// right away.
pub fn spawn_foreground(args: Vec<OsString>) -> Result<Status> {
    let child = fork_child(args, false)?;
    let status = wait_for(child);
    tracing::debug!(pid = child.as_raw(), %status, "foreground child finished");

    if let Status::Signaled(_) = status {
        println!("{status}");
    }
    let _ = io::stdout().flush();
    Ok(status)
}

/// Starts `args` without waiting and returns its pid for the job registry.
pub fn spawn_background(args: Vec<OsString>) -> Result<Pid> {
    let child = fork_child(args, true)?;
    println!("background pid is {child}");
    let _ = io::stdout().flush();
    Ok(child)
}

fn fork_child(args: Vec<OsString>, background: bool) -> Result<Pid> {
    // Anything still buffered would otherwise be written twice.
    let _ = io::stdout().flush();

    // SAFETY: the shell has no other threads, so the child can run arbitrary
    // code before it execs.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(pid = child.as_raw(), background, "forked");
            Ok(child)
        }
        Ok(ForkResult::Child) => {
            let code = match run_child(args, background) {
                Ok(never) => match never {},
                Err(code) => code,
            };
            process::exit(code)
        }
        Err(e) => Err(ShellError::Fork(e)),
    }
}

/// Child side: redirect, set signal dispositions, exec. Only returns if
/// something went wrong, with the status the child should exit with.
fn run_child(
    mut args: Vec<OsString>,
    background: bool,
) -> std::result::Result<Infallible, i32> {
    let redirections = Redirections::extract(&mut args).map_err(|e| {
        eprintln!("smallsh: {e}");
        1
    })?;
    redirections.apply(background).map_err(|e| {
        eprintln!("smallsh: {e}");
        1
    })?;

    if background {
        signal_handler::setup_background_child();
    } else {
        signal_handler::setup_foreground_child();
    }

    if let Ok(argv) = args
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()
    {
        let _ = execvp(&argv[0], &argv);
    }

    eprintln!("smallsh: {}: command not found", args[0].to_string_lossy());
    drop(args);
    Err(1)
}

fn wait_for(pid: Pid) -> Status {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(status) = Status::from_wait(status) {
                    return status;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                tracing::warn!(pid = pid.as_raw(), error = %e, "waitpid failed");
                return Status::Exited(1);
            }
        }
    }
}
