use std::io;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod command;
mod error;
mod input;
mod jobs;
mod prompt;
mod redirects;
mod shell;
mod signal_handler;
mod spawn;
mod variables;

/// smallsh - a small interactive shell
#[derive(Parser, Debug)]
#[command(name = "smallsh", version)]
#[command(about = "A small shell with background jobs and a foreground-only mode")]
struct Args {
    /// Log filter for the shell's own diagnostics (e.g. `debug`); overrides SMALLSH_LOG
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Do not print the `: ` prompt
    #[arg(long)]
    no_prompt: bool,
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_env("SMALLSH_LOG").unwrap_or_else(|_| EnvFilter::new("off")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.log.as_deref());

    let prompt = if args.no_prompt {
        prompt::Prompt::silent()
    } else {
        prompt::Prompt::new()
    };

    let result = shell::Shell::new(io::stdin().lock(), prompt).and_then(|mut shell| shell.run());
    if let Err(e) = result {
        eprintln!("smallsh: {e}");
        process::exit(1);
    }
}
