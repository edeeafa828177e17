//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// frontpipe - Build and serve a static front-end project
#[derive(Parser)]
#[command(name = "frontpipe")]
#[command(about = "frontpipe - Build HTML, SCSS, JS, images and sprites into dist/, with a live-reload dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove the output directory
    Clean,

    /// Clean, then run every build step once
    Build,

    /// Build, then watch sources and serve the output with live reload
    #[command(alias = "front")]
    Dev,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clean => build::run_clean(),
        Commands::Build => build::run_build(),
        Commands::Dev => build::run_dev(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_front_alias() {
        let cli = Cli::try_parse_from(["frontpipe", "front"]).unwrap();
        assert!(matches!(cli.command, Commands::Dev));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["frontpipe", "build", "--watch"]).is_err());
    }
}
