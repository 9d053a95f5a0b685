//! Process-group and terminal plumbing shared by the executor and the
//! `fg`/`bg` intrinsics.

use std::collections::HashSet;
use std::io;

pub enum WaitOutcome {
    Exited(i32),
    Stopped,
}

pub fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            // Already exec'd or gone; best-effort is fine here, as in exec().
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Block until the process group led by `pgid` is either fully reaped or
/// stopped as a whole (Ctrl-Z). Used by `fg` to resume a backgrounded job
/// in the foreground.
pub fn wait_for_group(pgid: libc::pid_t) -> io::Result<WaitOutcome> {
    let mut raw_status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(-pgid, &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            // ECHILD: already reaped by someone else; treat as a clean exit.
            if err.raw_os_error() == Some(libc::ECHILD) {
                return Ok(WaitOutcome::Exited(0));
            }
            return Err(err);
        }
        if unsafe { libc::WIFSTOPPED(raw_status) } {
            return Ok(WaitOutcome::Stopped);
        }
        if let Some(code) = crate::status::exit_code_from_wait_status(raw_status) {
            return Ok(WaitOutcome::Exited(code));
        }
    }
}

/// Outcome of waiting on a just-launched foreground pipeline.
pub enum ForegroundWait {
    /// All stages finished; carries the exit code of the pipeline's last
    /// stage (the one whose exit status the shell reports).
    Exited(i32),
    Stopped,
    /// Ctrl-D (EOT) was observed on stdin while the pipeline ran.
    Eof,
}

/// The non-blocking wait loop: reap each pipeline child with
/// `WNOHANG | WUNTRACED`, interleaved with a bounded `poll()` on stdin so
/// Ctrl-D is noticed immediately even mid-pipeline, sleeping briefly
/// between iterations to avoid busy-looping.
pub fn wait_for_foreground_pipeline(
    pids: &[libc::pid_t],
    last_pid: libc::pid_t,
) -> io::Result<ForegroundWait> {
    if pids.is_empty() {
        return Ok(ForegroundWait::Exited(0));
    }

    let mut remaining: HashSet<libc::pid_t> = pids.iter().copied().collect();
    let mut last_exit_code = 0;

    while !remaining.is_empty() {
        let mut stopped = false;
        for &pid in pids {
            if !remaining.contains(&pid) {
                continue;
            }
            let mut raw_status: libc::c_int = 0;
            let rc = unsafe {
                libc::waitpid(pid, &mut raw_status, libc::WNOHANG | libc::WUNTRACED)
            };
            if rc == 0 {
                continue;
            }
            if rc < 0 {
                remaining.remove(&pid);
                continue;
            }
            if unsafe { libc::WIFSTOPPED(raw_status) } {
                stopped = true;
                break;
            }
            remaining.remove(&pid);
            if pid == last_pid {
                last_exit_code = crate::status::exit_code_from_wait_status(raw_status).unwrap_or(1);
            }
        }

        if stopped {
            return Ok(ForegroundWait::Stopped);
        }
        if remaining.is_empty() {
            break;
        }

        if poll_stdin_for_eof(100)? {
            return Ok(ForegroundWait::Eof);
        }

        let ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 10_000_000,
        };
        unsafe { libc::nanosleep(&ts, std::ptr::null_mut()) };
    }

    Ok(ForegroundWait::Exited(last_exit_code))
}

/// Poll stdin for up to `timeout_ms`. Returns `true` if EOF (or an explicit
/// 0x04 byte) was observed; does not attempt to reinject any bytes it reads,
/// matching the accepted-limitation framing in the design notes.
fn poll_stdin_for_eof(timeout_ms: i32) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };

    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            return Ok(false);
        }
        return Err(err);
    }
    if rc == 0 {
        return Ok(false);
    }

    if pfd.revents & (libc::POLLHUP | libc::POLLERR) != 0 {
        return Ok(true);
    }
    if pfd.revents & libc::POLLIN != 0 {
        let mut buf = [0u8; 16];
        let n = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n == 0 {
            return Ok(true);
        }
        if n > 0 {
            return Ok(buf[..n as usize].contains(&4));
        }
    }
    Ok(false)
}

pub struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub fn new(target_pgid: libc::pid_t) -> io::Result<Self> {
        let tty_fd = if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            Some(libc::STDIN_FILENO)
        } else {
            None
        };

        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = Self { tty_fd, shell_pgid };

        if let Some(fd) = guard.tty_fd {
            set_terminal_foreground(fd, target_pgid)?;
        }

        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: libc::c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    // SIGTTOU would otherwise stop the shell itself when it isn't in the
    // foreground group at the moment it calls tcsetpgrp.
    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
