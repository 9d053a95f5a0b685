//! Pipeline execution: pipe wiring, fork/exec per stage, foreground wait,
//! and background harness launch.
//!
//! Grounded on `original_source/src/exec.c`'s `run_cmd_pipeline` (pipe
//! wiring + fork/dup2 per stage, in-child intrinsic dispatch) and
//! `execute_background_command` (the wrapping-fork launch). Diverges from
//! the teacher's `std::process::Command` + `pre_exec` + thread-per-builtin
//! approach: every stage here is a real `libc::fork()`, because a builtin
//! embedded mid-pipeline must run in an actual child process whose memory
//! is discarded on exit, not a thread that shares the shell's heap.

use std::ffi::CString;
use std::io;
use std::os::unix::io::AsRawFd;

use os_pipe::{PipeReader, PipeWriter};

use crate::intrinsics::{self, IntrinsicContext, Outcome};
use crate::job_control;
use crate::pipeline::{Pipeline, Stage};

pub enum ForegroundOutcome {
    Completed(i32),
    Stopped,
    Eof,
    /// `log execute …` resolved in-process; caller should re-enter the
    /// pipeline with this command without recording it to history.
    Replay(String),
}

/// Runs one `;`-separated command group: the in-process intrinsic
/// shortcut for a bare single-stage foreground command, the background
/// harness launch, or a forked pipeline.
pub fn execute(pipeline: &Pipeline, ctx: &mut IntrinsicContext) -> io::Result<ForegroundOutcome> {
    if !pipeline.background && pipeline.stages.len() == 1 {
        let stage = &pipeline.stages[0];
        if intrinsics::is_intrinsic_name(stage.program()) {
            return Ok(match intrinsics::dispatch(&stage.argv, ctx) {
                Outcome::Replay(cmd) => ForegroundOutcome::Replay(cmd),
                Outcome::Handled | Outcome::NotIntrinsic => ForegroundOutcome::Completed(0),
            });
        }
    }

    if pipeline.background {
        launch_background(pipeline, ctx)?;
        return Ok(ForegroundOutcome::Completed(0));
    }

    run_foreground(pipeline, ctx)
}

fn run_foreground(pipeline: &Pipeline, ctx: &mut IntrinsicContext) -> io::Result<ForegroundOutcome> {
    let (child_pids, leader_pgid) = fork_and_run_stages(pipeline, ctx, None)?;
    if child_pids.is_empty() {
        return Ok(ForegroundOutcome::Completed(1));
    }
    let last_pid = *child_pids.last().unwrap();

    crate::signal::set_foreground_pgid(leader_pgid);
    let guard = job_control::ForegroundTerminalGuard::new(leader_pgid).ok();

    let wait_result = job_control::wait_for_foreground_pipeline(&child_pids, last_pid);

    drop(guard);
    crate::signal::clear_foreground_pgid();

    match wait_result? {
        job_control::ForegroundWait::Exited(code) => Ok(ForegroundOutcome::Completed(code)),
        job_control::ForegroundWait::Stopped => {
            ctx.jobs
                .add_stopped(leader_pgid, leader_pgid, pipeline.command_text.clone());
            Ok(ForegroundOutcome::Stopped)
        }
        job_control::ForegroundWait::Eof => Ok(ForegroundOutcome::Eof),
    }
}

/// Wraps the whole pipeline in an outer fork so the shell's own foreground
/// wait loop is never used for it: the harness detaches from the
/// terminal, builds and runs the real pipeline with a blocking wait (it
/// has no terminal to poll for EOF), then exits. The harness's own pid
/// joins the Job Table as both `pid` and `pgid`.
fn launch_background(pipeline: &Pipeline, ctx: &mut IntrinsicContext) -> io::Result<()> {
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => {
            let _ = job_control::set_process_group(0, 0);
            redirect_stdin_to_devnull();

            let harness_pgid = unsafe { libc::getpid() };
            let (child_pids, _leader) =
                fork_and_run_stages(pipeline, ctx, Some(harness_pgid)).unwrap_or_default();
            for pid in child_pids {
                let mut status: libc::c_int = 0;
                unsafe { libc::waitpid(pid, &mut status, 0) };
            }
            std::process::exit(0);
        }
        pid => {
            ctx.jobs.add_running(pid, pid, pipeline.command_text.clone());
            Ok(())
        }
    }
}

fn redirect_stdin_to_devnull() {
    if let Ok(path) = CString::new("/dev/null") {
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
        if fd >= 0 {
            unsafe {
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::close(fd);
            }
        }
    }
}

/// Forks one child per stage, wiring N-1 pipes between them. When
/// `leader_override` is `None` the first successfully forked child
/// self-leads (`setpgid(0, 0)`) and later stages join it; when `Some(pgid)`
/// every stage joins that already-known group (the background harness
/// case, where the harness itself is the leader).
fn fork_and_run_stages(
    pipeline: &Pipeline,
    ctx: &mut IntrinsicContext,
    leader_override: Option<libc::pid_t>,
) -> io::Result<(Vec<libc::pid_t>, libc::pid_t)> {
    let n = pipeline.stages.len();
    let mut pipes: Vec<(PipeReader, PipeWriter)> = Vec::with_capacity(n.saturating_sub(1));
    for _ in 0..n.saturating_sub(1) {
        pipes.push(os_pipe::pipe()?);
    }

    let mut leader_pid: libc::pid_t = leader_override.unwrap_or(0);
    let mut child_pids = Vec::with_capacity(n);

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let stdin_fd = if i > 0 {
            Some(pipes[i - 1].0.as_raw_fd())
        } else {
            None
        };
        let stdout_fd = if i + 1 < n {
            Some(pipes[i].1.as_raw_fd())
        } else {
            None
        };

        match unsafe { libc::fork() } {
            -1 => continue,
            0 => {
                let target = if leader_pid == 0 { 0 } else { leader_pid };
                let _ = job_control::set_process_group(0, target);
                run_stage_in_child(stage, stdin_fd, stdout_fd, &pipes, ctx);
            }
            pid => {
                if leader_pid == 0 {
                    leader_pid = pid;
                }
                let _ = job_control::set_process_group(pid, leader_pid);
                child_pids.push(pid);
            }
        }
    }

    drop(pipes);
    Ok((child_pids, leader_pid))
}

/// Never returns: every path ends in `execvp` or `std::process::exit`.
/// Manual `libc::close` rather than letting `pipes` drop, since neither
/// `execvp` nor `process::exit` runs Rust destructors.
fn run_stage_in_child(
    stage: &Stage,
    stdin_fd: Option<libc::c_int>,
    stdout_fd: Option<libc::c_int>,
    pipes: &[(PipeReader, PipeWriter)],
    ctx: &mut IntrinsicContext,
) -> ! {
    if let Some(fd) = stdin_fd {
        unsafe { libc::dup2(fd, libc::STDIN_FILENO) };
    }
    if let Some(fd) = stdout_fd {
        unsafe { libc::dup2(fd, libc::STDOUT_FILENO) };
    }
    for (reader, writer) in pipes {
        unsafe {
            libc::close(reader.as_raw_fd());
            libc::close(writer.as_raw_fd());
        }
    }

    if let Some(path) = &stage.infile {
        match open_for_read(path) {
            Some(fd) => unsafe {
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::close(fd);
            },
            None => {
                println!("No such file or directory");
                std::process::exit(1);
            }
        }
    }
    if let Some(path) = &stage.outfile {
        match open_for_write(path, stage.append) {
            Some(fd) => unsafe {
                libc::dup2(fd, libc::STDOUT_FILENO);
                libc::close(fd);
            },
            None => {
                println!("Unable to create file for writing");
                std::process::exit(1);
            }
        }
    }

    if intrinsics::is_intrinsic_name(stage.program()) {
        intrinsics::dispatch(&stage.argv, ctx);
        std::process::exit(0);
    }

    exec_argv(&stage.argv);
}

fn exec_argv(argv: &[String]) -> ! {
    let cstrings: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect();
    let mut ptrs: Vec<*const libc::c_char> = cstrings.iter().map(|c| c.as_ptr()).collect();
    ptrs.push(std::ptr::null());

    unsafe {
        libc::execvp(ptrs[0], ptrs.as_ptr());
    }
    println!("Command not found!");
    std::process::exit(127);
}

fn open_for_read(path: &str) -> Option<libc::c_int> {
    let cpath = CString::new(path).ok()?;
    let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        None
    } else {
        Some(fd)
    }
}

fn open_for_write(path: &str, append: bool) -> Option<libc::c_int> {
    let cpath = CString::new(path).ok()?;
    let mode_flag = if append { libc::O_APPEND } else { libc::O_TRUNC };
    let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_WRONLY | libc::O_CREAT | mode_flag, 0o644) };
    if fd < 0 {
        None
    } else {
        Some(fd)
    }
}
