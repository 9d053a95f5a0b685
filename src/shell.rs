//! The top-level read-eval loop and shell-wide state: history, job table,
//! and the previous-working-directory slot `hop -`/`reveal -` consult.
//!
//! Grounded on `original_source/src/main.c`'s loop: print prompt, read one
//! line, skip blank input, validate, record history, dispatch, then — on
//! `log execute` — follow the unrecorded replay chain until it bottoms out.

use crate::executor::{self, ForegroundOutcome};
use crate::history::HistoryBuffer;
use crate::intrinsics::IntrinsicContext;
use crate::jobs::JobTable;
use crate::lexer;
use crate::line_input::{self, ReadLine};
use crate::pipeline;
use crate::prompt::Prompt;
use crate::signal;

pub struct Shell {
    prompt: Prompt,
    history: HistoryBuffer,
    jobs: JobTable,
    prev_cwd: Option<String>,
}

impl Shell {
    pub fn new() -> Self {
        Shell {
            prompt: Prompt::init(),
            history: HistoryBuffer::load(),
            jobs: JobTable::new(),
            prev_cwd: None,
        }
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.prompt.print();
            match line_input::read_line() {
                Ok(ReadLine::Line(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.run_line(&line, true);
                    self.jobs.reap_background();
                }
                Ok(ReadLine::Eof) | Err(_) => self.exit_now(),
            }
        }
    }

    fn run_line(&mut self, line: &str, record: bool) {
        if !lexer::validate_syntax(line) {
            println!("Invalid Syntax!");
            return;
        }
        if record {
            self.history.record(line);
        }

        for pline in pipeline::build_pipelines(line) {
            let mut ctx = self.intrinsic_ctx();
            match executor::execute(&pline, &mut ctx) {
                Ok(ForegroundOutcome::Completed(_)) | Ok(ForegroundOutcome::Stopped) => {}
                Ok(ForegroundOutcome::Eof) => self.exit_now(),
                Ok(ForegroundOutcome::Replay(cmd)) => self.run_replay_chain(cmd),
                Err(_) => {}
            }
        }
    }

    /// Follows a `log execute` chain: validate, run, and if that itself
    /// resolves to another replay, keep going — none of these hops are
    /// recorded to history.
    fn run_replay_chain(&mut self, mut current: String) {
        loop {
            if !lexer::validate_syntax(&current) {
                println!("Invalid Syntax!");
                return;
            }

            let mut next = None;
            for pline in pipeline::build_pipelines(&current) {
                let mut ctx = self.intrinsic_ctx();
                match executor::execute(&pline, &mut ctx) {
                    Ok(ForegroundOutcome::Replay(cmd)) => next = Some(cmd),
                    Ok(ForegroundOutcome::Eof) => self.exit_now(),
                    _ => {}
                }
            }

            match next {
                Some(cmd) => current = cmd,
                None => return,
            }
        }
    }

    fn intrinsic_ctx(&mut self) -> IntrinsicContext<'_> {
        IntrinsicContext {
            prev_cwd: &mut self.prev_cwd,
            history: &mut self.history,
            jobs: &mut self.jobs,
        }
    }

    /// Kills every tracked job, prints `logout` (only from the original
    /// shell process — a forked descendant that reaches this path via its
    /// own `Eof` handling must stay silent), and exits.
    fn exit_now(&mut self) -> ! {
        for pid in self.jobs.all_pids() {
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
        }
        if unsafe { libc::getpid() } == signal::shell_pid() {
            println!("\nlogout");
        }
        std::process::exit(0);
    }
}
