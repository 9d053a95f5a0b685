//! Byte-at-a-time raw-mode line reader.
//!
//! With the terminal in raw mode (see `terminal::RawModeGuard`) the kernel
//! does no line editing of its own, so the shell echoes characters and
//! handles backspace itself, and sees Ctrl-D (0x04) the instant it's typed
//! rather than only at the end of a canonical line.

use std::io::{self, Read, Write};

pub enum ReadLine {
    Line(String),
    Eof,
}

const BACKSPACE: u8 = 0x7f;
const CTRL_D: u8 = 0x04;

/// Reads one line from stdin, echoing input and handling backspace.
/// Returns `Eof` if Ctrl-D is seen before any characters, or on a read
/// error/EOF from the underlying fd.
pub fn read_line() -> io::Result<ReadLine> {
    let stdin = io::stdin();
    let mut handle = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut line = String::new();
    let mut byte = [0u8; 1];

    loop {
        let n = handle.read(&mut byte)?;
        if n == 0 {
            return Ok(ReadLine::Eof);
        }

        let c = byte[0];

        if c == CTRL_D {
            if line.is_empty() {
                return Ok(ReadLine::Eof);
            }
            continue;
        }

        if c == b'\r' || c == b'\n' {
            out.write_all(b"\n")?;
            out.flush()?;
            return Ok(ReadLine::Line(line));
        }

        if c == BACKSPACE || c == 0x08 {
            if line.pop().is_some() {
                out.write_all(b"\x08 \x08")?;
                out.flush()?;
            }
            continue;
        }

        line.push(c as char);
        out.write_all(&[c])?;
        out.flush()?;
    }
}
