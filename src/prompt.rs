//! Builds and prints the `<user@host:displaypath> ` prompt.
//!
//! `displaypath` collapses the shell's *launch* directory down to `~`,
//! mirroring the behavior of re-pointing `HOME` at that directory for the
//! whole process (see `shell::Shell::start` and SPEC_FULL.md §6) — `hop`,
//! the history file, and the prompt all agree on one notion of "home".

use std::io::{self, Write};

pub struct Prompt {
    shell_home: String,
    username: String,
    hostname: String,
}

impl Prompt {
    /// Captures the launch directory and overwrites `HOME` with it, so
    /// `hop`, the history file path, and this prompt's `~`-collapse all
    /// agree on the same notion of "home" for the rest of the process.
    /// Also resolves the username (`getpwuid` first, falling back to
    /// `$USER`, then `"unknown"`) and the hostname (falling back to
    /// `"unknown"` if `gethostname` fails).
    pub fn init() -> Self {
        let shell_home = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        if !shell_home.is_empty() {
            // SAFETY: called once at startup before any other thread exists.
            unsafe { std::env::set_var("HOME", &shell_home) };
        }

        let username = lookup_username().unwrap_or_else(|| {
            std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
        });

        let hostname = lookup_hostname().unwrap_or_else(|| "unknown".to_string());

        Prompt {
            shell_home,
            username,
            hostname,
        }
    }

    fn display_path(&self) -> String {
        let cwd = match std::env::current_dir() {
            Ok(p) => p.display().to_string(),
            Err(_) => return "?".to_string(),
        };

        if self.shell_home.is_empty() {
            return cwd;
        }
        if self.shell_home == "/" {
            return cwd;
        }
        if let Some(rest) = cwd.strip_prefix(&self.shell_home) {
            if rest.is_empty() {
                return "~".to_string();
            }
            if let Some(rest) = rest.strip_prefix('/') {
                return format!("~/{rest}");
            }
        }
        cwd
    }

    pub fn print(&self) {
        print!("<{}@{}:{}> ", self.username, self.hostname, self.display_path());
        let _ = io::stdout().flush();
    }
}

fn lookup_username() -> Option<String> {
    let uid = unsafe { libc::getuid() };
    let mut buf = vec![0i8; 4096];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe {
        libc::getpwuid_r(
            uid,
            &mut pwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };

    if rc != 0 || result.is_null() {
        return None;
    }

    let name = unsafe { std::ffi::CStr::from_ptr(pwd.pw_name) };
    name.to_str().ok().map(str::to_string)
}

fn lookup_hostname() -> Option<String> {
    let mut buf = vec![0u8; 256];
    let rc = unsafe {
        libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len())
    };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt_with_home(home: &str) -> Prompt {
        Prompt {
            shell_home: home.to_string(),
            username: "u".to_string(),
            hostname: "h".to_string(),
        }
    }

    #[test]
    fn collapses_exact_home_to_tilde() {
        let prompt = prompt_with_home(&std::env::current_dir().unwrap().display().to_string());
        assert_eq!(prompt.display_path(), "~");
    }

    #[test]
    fn root_home_never_collapses() {
        let prompt = prompt_with_home("/");
        assert_eq!(prompt.display_path(), std::env::current_dir().unwrap().display().to_string());
    }

    #[test]
    fn unrelated_home_keeps_full_path() {
        let prompt = prompt_with_home("/this/path/does/not/exist/as/a/prefix");
        assert_eq!(prompt.display_path(), std::env::current_dir().unwrap().display().to_string());
    }
}
