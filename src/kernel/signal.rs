use crate::config::types::Result;
use log::info;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
/// Async-safe shutdown signalling and process-group termination
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

/// Global shutdown flag (async-safe atomic)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Global signal received (async-safe atomic)
static SIGNAL_RECEIVED: AtomicU32 = AtomicU32::new(0);

/// Grace period between SIGTERM and SIGKILL when terminating a group
pub const TERMINATE_GRACE: Duration = Duration::from_millis(100);

/// Signal handler state
pub struct SignalHandler;

impl SignalHandler {
    /// Install SIGINT, SIGTERM and SIGHUP handlers.
    /// Must be called early in main() before any threads are spawned.
    pub fn init() -> Result<Self> {
        // No SA_RESTART: a blocking dequeue should return promptly on shutdown.
        let sig_action = SigAction::new(
            SigHandler::Handler(Self::signal_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );

        for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
            // SAFETY: the handler only touches atomics.
            unsafe { signal::sigaction(sig, &sig_action) }?;
        }

        info!("Signal handlers installed (SIGINT, SIGTERM, SIGHUP)");
        Ok(Self)
    }

    /// Only performs atomic operations: no allocations, no locks, no I/O
    extern "C" fn signal_handler(signal: libc::c_int) {
        SIGNAL_RECEIVED.store(signal as u32, Ordering::SeqCst);
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
    }

    /// Signal that was received (0 if none)
    pub fn get_signal(&self) -> u32 {
        SIGNAL_RECEIVED.load(Ordering::SeqCst)
    }
}

/// Main loop helper: false once a shutdown signal has arrived
pub fn should_continue() -> bool {
    !SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Terminate a whole process group: SIGTERM, brief grace, then SIGKILL.
///
/// `pgid` is the pid of a child spawned as its own group leader. ESRCH is
/// expected when the group already exited and is ignored. The SIGKILL is
/// sent even when the SIGTERM found nobody; the grace period is skipped then.
pub fn terminate_process_group(pgid: u32) {
    let pgid = Pid::from_raw(pgid as i32);
    if signal::killpg(pgid, Signal::SIGTERM).is_ok() {
        thread::sleep(TERMINATE_GRACE);
    }
    let _ = signal::killpg(pgid, Signal::SIGKILL);
}

/// Kill whatever is left of a process group without a grace period
pub fn kill_process_group(pgid: u32) {
    let _ = signal::killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL);
}
