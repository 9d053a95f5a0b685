//! SIGINT/SIGTSTP forwarding to the current foreground process group.
//!
//! The handlers are the only async-signal-safe code in the crate: they
//! read a single `AtomicI32` cell and issue one `kill(-pgid, sig)` call.
//! No allocation, no locking, no access to the rest of the shell's state —
//! exactly the "async-signal context" design note calls for.

use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);
static SHELL_PID: AtomicI32 = AtomicI32::new(0);

/// Record which process group should receive forwarded interrupt/stop
/// signals. Call with `0` when no foreground pipeline is running.
pub fn set_foreground_pgid(pgid: libc::pid_t) {
    FOREGROUND_PGID.store(pgid, Ordering::SeqCst);
}

pub fn clear_foreground_pgid() {
    FOREGROUND_PGID.store(0, Ordering::SeqCst);
}

pub fn shell_pid() -> libc::pid_t {
    SHELL_PID.load(Ordering::SeqCst)
}

extern "C" fn sigint_handler(_signo: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGINT);
        }
    }
}

extern "C" fn sigtstp_handler(_signo: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGTSTP);
        }
    }
}

/// Install the SIGINT/SIGTSTP handlers and record the shell's own pid
/// (used later to decide whether to print `logout` on exit — only the
/// original shell process does, never a forked child that happens to
/// reach the same exit path).
pub fn install() -> io::Result<()> {
    SHELL_PID.store(unsafe { libc::getpid() }, Ordering::SeqCst);

    install_handler(libc::SIGINT, sigint_handler)?;
    install_handler(libc::SIGTSTP, sigtstp_handler)?;
    Ok(())
}

fn install_handler(
    signal: libc::c_int,
    handler: extern "C" fn(libc::c_int),
) -> io::Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler as usize;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    action.sa_flags = libc::SA_RESTART;

    let rc = unsafe { libc::sigaction(signal, &action, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
