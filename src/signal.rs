//! SIGINT handling.
//!
//! Ctrl-C raises a flag that the session checks between orders, so an
//! interrupted run still reports what it measured.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signum: libc::c_int) {
    // Only async-signal-safe work here
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Install the SIGINT handler and return the flag it raises.
pub fn install_interrupt_flag() -> io::Result<&'static AtomicBool> {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(&INTERRUPTED)
}
