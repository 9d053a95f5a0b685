//! Command history: capped in-memory buffer persisted to `$HOME/.osh_history`
//! after every mutation, oldest-first on disk, newest-last in memory.
//!
//! Grounded on `original_source/src/intrinsics.c`'s `history_buf` family:
//! same cap, same dedup-and-move-to-newest rule, same "skip lines containing
//! a `log` atomic" rule, same immediate persist-on-write.

use std::fs;
use std::io;
use std::path::PathBuf;

const HIST_MAX: usize = 15;
const HIST_FILENAME: &str = ".osh_history";

pub struct HistoryBuffer {
    /// oldest .. newest
    entries: Vec<String>,
}

impl HistoryBuffer {
    /// An empty buffer that never touches disk — used for throwaway
    /// contexts (forked-child intrinsic dispatch, tests).
    pub fn empty() -> Self {
        HistoryBuffer {
            entries: Vec::new(),
        }
    }

    /// Loads existing history from `$HOME/.osh_history`, keeping only the
    /// last `HIST_MAX` lines if the file holds more. A missing file is not
    /// an error — it simply means empty history.
    pub fn load() -> Self {
        let mut entries = Vec::new();
        if let Some(path) = history_path() {
            if let Ok(contents) = fs::read_to_string(&path) {
                let lines: Vec<String> = contents
                    .lines()
                    .map(str::to_string)
                    .filter(|l| !l.is_empty())
                    .collect();
                let start = lines.len().saturating_sub(HIST_MAX);
                entries = lines[start..].to_vec();
            }
        }
        HistoryBuffer { entries }
    }

    /// Records `line` unless it contains an atomic command named `log`, or
    /// it's an exact repeat of the most recent entry. An existing occurrence
    /// elsewhere in history is removed before the line is appended anew, so
    /// each distinct command appears once, at the newest position.
    pub fn record(&mut self, line: &str) {
        if line_contains_atomic_log(line) {
            return;
        }
        if self.entries.last().map(String::as_str) == Some(line) {
            return;
        }

        if let Some(pos) = self.entries.iter().position(|e| e == line) {
            self.entries.remove(pos);
        }

        if self.entries.len() == HIST_MAX {
            self.entries.remove(0);
        }
        self.entries.push(line.to_string());
        self.persist();
    }

    pub fn purge(&mut self) {
        self.entries.clear();
        self.persist();
    }

    /// oldest -> newest, for `log` with no arguments.
    pub fn entries_oldest_first(&self) -> &[String] {
        &self.entries
    }

    /// 1-based, newest-first lookup for `log execute <idx>`.
    pub fn at_newest_index(&self, idx: usize) -> Option<&str> {
        if idx == 0 || idx > self.entries.len() {
            return None;
        }
        let pos = self.entries.len() - idx;
        self.entries.get(pos).map(String::as_str)
    }

    fn persist(&self) {
        if let Some(path) = history_path() {
            let mut body = String::new();
            for entry in &self.entries {
                body.push_str(entry);
                body.push('\n');
            }
            let _ = fs::write(path, body);
        }
    }
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HIST_FILENAME))
}

/// Mirrors `line_contains_atomic_log`: walks whitespace/separator-delimited
/// atomics in the raw line and checks whether any atomic's first word is
/// exactly `log`.
fn line_contains_atomic_log(line: &str) -> bool {
    let bytes = line.as_bytes();
    let mut i = 0;
    let n = bytes.len();

    while i < n {
        while i < n && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= n {
            break;
        }
        if matches!(bytes[i], b'|' | b';' | b'&') {
            i += 1;
            continue;
        }
        let start = i;
        while i < n
            && !(bytes[i] as char).is_whitespace()
            && !matches!(bytes[i], b'|' | b';' | b'&' | b'<' | b'>')
        {
            i += 1;
        }
        if &line[start..i] == "log" {
            return true;
        }
        while i < n && !matches!(bytes[i], b'|' | b';' | b'&') {
            i += 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_log_atomic_among_pipeline_stages() {
        assert!(line_contains_atomic_log("echo hi | log"));
        assert!(line_contains_atomic_log("log execute 1"));
        assert!(!line_contains_atomic_log("echo logrotate"));
        assert!(!line_contains_atomic_log("echo hi"));
    }

    #[test]
    fn record_moves_duplicate_to_newest() {
        let mut h = HistoryBuffer { entries: Vec::new() };
        h.entries = vec!["a".into(), "b".into(), "c".into()];
        h.record("a");
        assert_eq!(h.entries, vec!["b", "c", "a"]);
    }

    #[test]
    fn record_skips_exact_repeat_of_newest() {
        let mut h = HistoryBuffer { entries: vec!["a".into()] };
        h.record("a");
        assert_eq!(h.entries, vec!["a"]);
    }

    #[test]
    fn record_skips_lines_with_log_atomic() {
        let mut h = HistoryBuffer { entries: Vec::new() };
        h.record("log execute 1");
        assert!(h.entries.is_empty());
    }

    #[test]
    fn record_evicts_oldest_past_cap() {
        let mut h = HistoryBuffer { entries: Vec::new() };
        for i in 0..HIST_MAX {
            h.record(&format!("cmd{i}"));
        }
        h.record("overflow");
        assert_eq!(h.entries.len(), HIST_MAX);
        assert_eq!(h.entries[0], "cmd1");
        assert_eq!(h.entries.last().unwrap(), "overflow");
    }

    #[test]
    fn at_newest_index_is_one_based_newest_first() {
        let h = HistoryBuffer { entries: vec!["a".into(), "b".into(), "c".into()] };
        assert_eq!(h.at_newest_index(1), Some("c"));
        assert_eq!(h.at_newest_index(3), Some("a"));
        assert_eq!(h.at_newest_index(4), None);
        assert_eq!(h.at_newest_index(0), None);
    }
}
