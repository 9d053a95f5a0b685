//! The job table: background and stopped jobs tracked by the shell.
//!
//! Each entry owns the pid of its process-group leader exactly as the
//! shell launched it — a direct child of the shell process, whether it is
//! a lone external command or the harness process fronting a whole
//! background pipeline (see `executor::launch_background`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pid: libc::pid_t,
    pub pgid: libc::pid_t,
    pub command: String,
    pub status: JobStatus,
}

/// Most-recently-added-first ordering, mirroring the singly linked list the
/// design notes describe (`jobs.insert(0, ..)` is the Rust-shaped analogue
/// of "push onto the head").
#[derive(Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a freshly launched background job. Prints `[id] pid`.
    pub fn add_running(&mut self, pid: libc::pid_t, pgid: libc::pid_t, command: String) -> usize {
        let id = self.next_id();
        println!("[{id}] {pid}");
        self.jobs.insert(
            0,
            Job {
                id,
                pid,
                pgid,
                command,
                status: JobStatus::Running,
            },
        );
        id
    }

    /// Register a job that was stopped (Ctrl-Z, or re-stopped after `fg`).
    /// Prints `[id] Stopped cmd`.
    pub fn add_stopped(&mut self, pid: libc::pid_t, pgid: libc::pid_t, command: String) -> usize {
        let id = self.next_id();
        println!("[{id}] Stopped {command}");
        self.jobs.insert(
            0,
            Job {
                id,
                pid,
                pgid,
                command,
                status: JobStatus::Stopped,
            },
        );
        id
    }

    pub fn find(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Job id of the most recently added entry, for `fg`/`bg` with no argument.
    pub fn most_recent_id(&self) -> Option<usize> {
        self.jobs.first().map(|j| j.id)
    }

    /// Remove a job by id and return it (used by `fg`, which takes exclusive
    /// ownership of the entry for the duration of the wait).
    pub fn unlink(&mut self, id: usize) -> Option<Job> {
        let pos = self.jobs.iter().position(|j| j.id == id)?;
        Some(self.jobs.remove(pos))
    }

    pub fn set_stopped(&mut self, id: usize, stopped: bool) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.id == id) {
            job.status = if stopped {
                JobStatus::Stopped
            } else {
                JobStatus::Running
            };
        }
    }

    /// Non-blocking reap of background jobs that have exited. Prints a
    /// completion line per job, plus one trailing blank line if anything
    /// was reaped. Stopped jobs are left untouched — only `WNOHANG` exits
    /// are observed here, never `WUNTRACED`.
    pub fn reap_background(&mut self) {
        let mut finished = false;
        let mut i = 0;
        while i < self.jobs.len() {
            if self.jobs[i].status != JobStatus::Running {
                i += 1;
                continue;
            }
            match try_wait(self.jobs[i].pid) {
                Some(Reaped::Exited(0)) => {
                    println!("\n{} with pid {} exited normally", self.jobs[i].command, self.jobs[i].pid);
                    self.jobs.remove(i);
                    finished = true;
                }
                Some(Reaped::Exited(_)) | Some(Reaped::Signaled) => {
                    println!("\n{} with pid {} exited abnormally", self.jobs[i].command, self.jobs[i].pid);
                    self.jobs.remove(i);
                    finished = true;
                }
                Some(Reaped::StillRunning) | None => {
                    i += 1;
                }
            }
        }
        if finished {
            println!();
        }
    }

    /// `activities`: silently drops any job that has exited or been killed,
    /// keeps running/stopped jobs, and returns them sorted by command name.
    pub fn activities(&mut self) -> Vec<(libc::pid_t, String, JobStatus)> {
        let mut i = 0;
        while i < self.jobs.len() {
            match try_wait_with_stop(self.jobs[i].pid) {
                WaitChange::Gone => {
                    self.jobs.remove(i);
                }
                WaitChange::Stopped => {
                    self.jobs[i].status = JobStatus::Stopped;
                    i += 1;
                }
                WaitChange::Continued => {
                    self.jobs[i].status = JobStatus::Running;
                    i += 1;
                }
                WaitChange::NoChange => {
                    i += 1;
                }
            }
        }

        let mut snapshot: Vec<(libc::pid_t, String, JobStatus)> = self
            .jobs
            .iter()
            .map(|j| (j.pid, j.command.clone(), j.status))
            .collect();
        snapshot.sort_by(|a, b| a.1.cmp(&b.1));
        snapshot
    }

    pub fn all_pids(&self) -> Vec<libc::pid_t> {
        self.jobs.iter().map(|j| j.pid).collect()
    }
}

enum Reaped {
    Exited(i32),
    Signaled,
    StillRunning,
}

fn try_wait(pid: libc::pid_t) -> Option<Reaped> {
    let mut status: libc::c_int = 0;
    let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
    if rc == 0 {
        return Some(Reaped::StillRunning);
    }
    if rc < 0 {
        return None;
    }
    if unsafe { libc::WIFEXITED(status) } {
        Some(Reaped::Exited(unsafe { libc::WEXITSTATUS(status) }))
    } else {
        Some(Reaped::Signaled)
    }
}

enum WaitChange {
    Gone,
    Stopped,
    Continued,
    NoChange,
}

fn try_wait_with_stop(pid: libc::pid_t) -> WaitChange {
    let mut status: libc::c_int = 0;
    let rc = unsafe {
        libc::waitpid(
            pid,
            &mut status,
            libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
        )
    };
    if rc == 0 {
        return WaitChange::NoChange;
    }
    if rc < 0 {
        return WaitChange::Gone;
    }
    if unsafe { libc::WIFEXITED(status) } || unsafe { libc::WIFSIGNALED(status) } {
        WaitChange::Gone
    } else if unsafe { libc::WIFSTOPPED(status) } {
        WaitChange::Stopped
    } else {
        WaitChange::Continued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_is_last_added() {
        let mut table = JobTable::new();
        table.add_running(100, 100, "sleep 1".to_string());
        table.add_running(200, 200, "sleep 2".to_string());
        assert_eq!(table.most_recent_id(), Some(2));
    }

    #[test]
    fn unlink_removes_and_returns() {
        let mut table = JobTable::new();
        table.add_running(100, 100, "sleep 1".to_string());
        let job = table.unlink(1).expect("job present");
        assert_eq!(job.pid, 100);
        assert!(table.find(1).is_none());
    }

    #[test]
    fn ids_are_monotonic_even_after_removal() {
        let mut table = JobTable::new();
        table.add_running(100, 100, "a".to_string());
        table.unlink(1);
        table.add_running(200, 200, "b".to_string());
        assert_eq!(table.find(2).map(|j| j.pid), Some(200));
    }
}
