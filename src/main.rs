mod executor;
mod history;
mod intrinsics;
mod job_control;
mod jobs;
mod lexer;
mod line_input;
mod pipeline;
mod prompt;
mod shell;
mod signal;
mod status;
mod terminal;

fn main() {
    let _raw_mode = terminal::RawModeGuard::enable().expect("failed to query terminal attributes");
    signal::install().expect("failed to install signal handlers");

    shell::Shell::new().run();
}
