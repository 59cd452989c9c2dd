//! # ManeleMax
//!
//! Watches the system media session and drives the master volume: tracks by
//! the artists in the built-in keyword list play at full volume and cannot be
//! muted, everything else is held at background volume.
//!
//! ## Usage
//!
//! ```bash
//! # Start enforcing (Windows)
//! manelemax run
//!
//! # Check what a title would match
//! manelemax match "Florin Salam - Saint Tropez"
//!
//! # List built-in keywords
//! manelemax keywords
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::{debug, info};
use manelemax::{cli, completion, config, keywords};
use std::io::{self, BufRead};

/// Runs the enforcer until `quit` is typed.
///
/// The console stands in for a tray label: an empty line or `status` prints
/// the current match. If stdin is closed the enforcer keeps running until the
/// process is terminated.
fn run(config: &config::Config) -> Result<()> {
    let enforcer = manelemax::initialize(config)?;
    let matches = enforcer.match_handle();

    println!("ManeleMax running. Press Enter for status, type 'quit' to exit.");

    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" | "status" => {
                let current = matches.current_match();
                if current.is_empty() {
                    println!("No keyword match");
                } else {
                    println!("Matched: {current}");
                }
            }
            "q" | "quit" | "exit" => {
                info!("Quit requested");
                return Ok(());
            }
            other => println!("Unknown input '{other}'. Use 'status' or 'quit'."),
        }
    }

    debug!("stdin closed, running until terminated");
    loop {
        std::thread::park();
    }
}

/// Main entry point for the ManeleMax application.
///
/// Initializes logging, parses command-line arguments, and routes commands.
///
/// # Logging
///
/// Controlled via `RUST_LOG`:
/// - `RUST_LOG=debug manelemax run` - Enable debug logging
/// - `RUST_LOG=manelemax::controller=trace manelemax run` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Run => {
            let config = config::Config::load(args.config.as_deref())?;
            run(&config)?;
        }
        cli::Command::Match { text, max_words } => {
            let config = config::Config::load(args.config.as_deref())?;
            let text = text.join(" ");
            let max_words = max_words.unwrap_or(config.max_words);

            match keywords::find_match(&text, &keywords::KeywordSet::builtin(), max_words) {
                Some(found) => println!("{found}"),
                None => println!("no match"),
            }
        }
        cli::Command::Keywords => {
            for keyword in keywords::KeywordSet::builtin().sorted() {
                println!("{keyword}");
            }
        }
        cli::Command::Config => {
            let config = config::Config::load(args.config.as_deref())?;
            println!("{}", config.to_json()?);
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
    }

    Ok(())
}
