//! Terminal raw-mode control.
//!
//! The shell switches stdin to non-canonical, no-echo mode at startup so
//! that Ctrl-D (0x04) is visible to the foreground wait loop's `poll()`
//! immediately, rather than waiting for a full canonical line. Original
//! attributes are restored two ways: a `Drop` guard for the ordinary exit
//! path, and a `libc::atexit` hook as a safety net for paths that call
//! `std::process::exit` directly (Ctrl-D, a fatal startup error) and would
//! otherwise skip the guard's destructor.

use std::io;
use std::sync::OnceLock;

static SAVED_TERMIOS: OnceLock<libc::termios> = OnceLock::new();

pub struct RawModeGuard {
    original: libc::termios,
}

impl RawModeGuard {
    /// Save the current terminal attributes and switch stdin to raw mode.
    /// Returns `Ok(None)` when stdin isn't a terminal (e.g. under test
    /// harnesses piping input) — nothing to restore, nothing to guard.
    pub fn enable() -> io::Result<Option<Self>> {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
            return Ok(None);
        }

        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &mut original) } != 0 {
            return Err(io::Error::last_os_error());
        }

        SAVED_TERMIOS.get_or_init(|| original);
        register_atexit_restore();

        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Some(Self { original }))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

fn register_atexit_restore() {
    extern "C" fn restore() {
        if let Some(original) = SAVED_TERMIOS.get() {
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
    unsafe {
        libc::atexit(restore);
    }
}
