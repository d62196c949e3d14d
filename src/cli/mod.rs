//! CLI surface: `scopeward run|config|replay`.

pub mod config_cmd;
pub mod replay;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scopeward")]
#[command(version, about = "Autonomous development-task orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a development task against a repository.
    Run {
        /// The user's request in plain language.
        request: String,

        #[arg(long)]
        repo_root: Option<PathBuf>,

        #[arg(long)]
        max_iterations: Option<u32>,

        #[arg(long)]
        review_interval: Option<u32>,

        #[arg(long)]
        max_attempts: Option<u32>,

        /// Path to an append-only checkpoint log.
        #[arg(long)]
        checkpoint_path: Option<PathBuf>,

        /// Drive the run with canned responses instead of a real agent backend.
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect or scaffold `scopeward.toml`.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Re-render a previously recorded checkpoint log without re-invoking agents.
    Replay { checkpoint_path: PathBuf },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved (file → env) configuration.
    Show,
    /// Validate `scopeward.toml` and report errors.
    Validate,
    /// Write a default `scopeward.toml` to the current directory.
    Init,
}
