#![allow(non_snake_case)]

mod builtins;

mod config;

mod control;

mod error;

mod event;

mod job;

mod launcher;

mod parser;

mod shell;

mod signals;

use std::env;
use std::io;
use std::process;

use anyhow::{Context, Result};
use config::{usage, Config, UsageRequested};
use crossterm::tty::IsTty;
use error::ExitStatus;
use nix::unistd;
use shell::Shell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // RUST_LOG controls tracing output; -v is the shell's own diagnostics
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        println!("{e:#}");
        process::exit(ExitStatus::Failure.into());
    }
    process::exit(ExitStatus::Success.into());
}

fn run() -> Result<()> {
    let config = match Config::from_args(env::args().skip(1)) {
        Ok(config) => config.with_env_overrides(),
        Err(UsageRequested) => {
            println!("{}", usage());
            process::exit(ExitStatus::Failure.into());
        }
    };

    // Everything goes to stdout so a driver reading one pipe sees all output.
    unistd::dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO).context("dup2 error")?;

    if !io::stdout().is_tty() {
        colored::control::set_override(false);
    }

    let mut shell = Shell::new(config);
    signals::install(shell.job_control()).context("Signal error")?;
    shell.exec()?;
    Ok(())
}
