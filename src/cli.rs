//! # Command-Line Interface Module
//!
//! Clap definitions for the `manelemax` binary.
//!
//! ## Commands
//!
//! - `run`: Enforce the volume policy until told to quit
//! - `match`: Test a title or artist against the built-in keywords
//! - `keywords`: List the built-in keywords
//! - `config`: Show the effective configuration
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! manelemax run
//! manelemax match "Nicolae Guță - Hit"
//! manelemax --config ./quiet.json run
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "manelemax")]
#[command(about = "ManeleMax: full volume for the right songs, background volume for the rest")]
#[command(version)]
pub struct Args {
    /// Path to a JSON config file
    ///
    /// Defaults to manelemax/config.json in the platform config directory.
    #[arg(long, global = true, env = "MANELEMAX_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enforce the volume policy for the current media session
    ///
    /// Watches what is playing and adjusts the system volume until stopped.
    /// Press Enter to show the current keyword match, type `quit` to exit.
    Run,

    /// Test text against the built-in keywords
    ///
    /// Prints the matched keyword, or "no match".
    Match {
        /// Title or artist to test
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Longest keyword phrase to try, in words (0 = no limit)
        #[arg(long)]
        max_words: Option<usize>,
    },

    /// List the built-in keywords
    Keywords,

    /// Print the effective configuration as JSON
    Config,

    /// Generate shell completions
    ///
    /// Usage: manelemax completion bash > ~/.local/share/bash-completion/completions/manelemax
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
