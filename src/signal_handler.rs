use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd;

use crate::error::{Result, ShellError};

const ENTER_FOREGROUND_ONLY: &[u8] = b"\nEntering foreground-only mode (& is now ignored)\n";
const EXIT_FOREGROUND_ONLY: &[u8] = b"\nExiting foreground-only mode\n";

/// Whether a trailing `&` is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    ForegroundOnly,
}

impl Mode {
    /// Odd delivery counts mean foreground-only.
    pub fn from_deliveries(count: usize) -> Self {
        if count % 2 == 1 {
            Mode::ForegroundOnly
        } else {
            Mode::Normal
        }
    }
}

/// Count of SIGTSTP deliveries. Written only by the signal handler, read by
/// the main loop, so an atomic counter is the whole synchronization story.
pub struct ModeState {
    deliveries: AtomicUsize,
}

impl ModeState {
    pub const fn new() -> Self {
        ModeState {
            deliveries: AtomicUsize::new(0),
        }
    }

    /// Records one delivery and returns the mode it leads to.
    pub fn toggle(&self) -> Mode {
        let count = self.deliveries.fetch_add(1, Ordering::SeqCst) + 1;
        Mode::from_deliveries(count)
    }

    pub fn deliveries(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> Mode {
        Mode::from_deliveries(self.deliveries())
    }
}

static MODE_STATE: ModeState = ModeState::new();

// Async-signal-safe: one atomic add and one write(2) of a static buffer.
extern "C" fn handle_sigtstp(_: libc::c_int) {
    let message = match MODE_STATE.toggle() {
        Mode::ForegroundOnly => ENTER_FOREGROUND_ONLY,
        Mode::Normal => EXIT_FOREGROUND_ONLY,
    };
    write_raw(message);
}

fn write_raw(bytes: &[u8]) {
    // SAFETY: fd 1 stays open for the life of the process.
    let stdout = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
    let _ = unistd::write(stdout, bytes);
}

fn set_disposition(signal: Signal, handler: SigHandler) -> nix::Result<()> {
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::all());
    // SAFETY: the only handler installed here is `handle_sigtstp`, which is
    // async-signal-safe.
    unsafe { sigaction(signal, &action) }.map(|_| ())
}

/// Owner of the process-wide signal dispositions and the foreground-only
/// toggle. Created once at startup; the parser gets the mode from it through
/// [`SignalHandler::mode`] rather than reading any global.
pub struct SignalHandler {
    state: &'static ModeState,
}

impl SignalHandler {
    pub fn install() -> Result<Self> {
        let handler = SignalHandler { state: &MODE_STATE };
        handler.setup_shell()?;
        tracing::debug!("signal dispositions installed");
        Ok(handler)
    }

    /// Parent context: ignore SIGINT, catch SIGTSTP.
    pub fn setup_shell(&self) -> Result<()> {
        set_disposition(Signal::SIGINT, SigHandler::SigIgn).map_err(ShellError::Signal)?;
        set_disposition(Signal::SIGTSTP, SigHandler::Handler(handle_sigtstp))
            .map_err(ShellError::Signal)?;
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn deliveries(&self) -> usize {
        self.state.deliveries()
    }
}

/// Called in a freshly forked foreground child: Ctrl-C kills it, Ctrl-Z is
/// left to the interactive parent.
pub fn setup_foreground_child() {
    let _ = set_disposition(Signal::SIGINT, SigHandler::SigDfl);
    let _ = set_disposition(Signal::SIGTSTP, SigHandler::SigIgn);
}

/// Called in a freshly forked background child: deaf to both.
pub fn setup_background_child() {
    let _ = set_disposition(Signal::SIGINT, SigHandler::SigIgn);
    let _ = set_disposition(Signal::SIGTSTP, SigHandler::SigIgn);
}
