use anyhow::{Context, Result};
use clap::Parser;
use scopeward::cli::{self, Cli, Commands, ConfigCommands};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    scopeward::logging::init(cli.verbose);

    let code = match cli.command {
        Commands::Run {
            request,
            repo_root,
            max_iterations,
            review_interval,
            max_attempts,
            checkpoint_path,
            dry_run,
        } => {
            cli::run::execute(
                request,
                repo_root,
                max_iterations,
                review_interval,
                max_attempts,
                checkpoint_path,
                dry_run,
                cli.verbose,
            )
            .await?
        }
        Commands::Config { command } => {
            let repo_root = std::env::current_dir().context("failed to resolve current directory")?;
            match command {
                ConfigCommands::Show => cli::config_cmd::show(&repo_root)?,
                ConfigCommands::Validate => cli::config_cmd::validate(&repo_root)?,
                ConfigCommands::Init => cli::config_cmd::init(&repo_root)?,
            }
            0
        }
        Commands::Replay { checkpoint_path } => {
            cli::replay::execute(&checkpoint_path)?;
            0
        }
    };

    Ok(ExitCode::from(code as u8))
}
