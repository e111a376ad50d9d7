use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Alliance;

/// autoscript - scripted autonomous routines for a mobile robot
#[derive(Parser)]
#[command(name = "autoscript")]
#[command(about = "Compile and dry-run scripted autonomous robot routines")]
#[command(version)]
pub struct Cli {
    /// Log state transitions and scheduler decisions (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a script and print its command tree
    Check {
        /// Script file to compile
        script: PathBuf,

        /// Configuration file supplying tuning constants
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a routine against the simulated robot
    Run {
        /// Script file to run (defaults to the configured routine)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured alliance
        #[arg(long)]
        alliance: Option<Alliance>,

        /// Pace ticks in real time instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },
    /// List available script commands
    Commands,
    /// Write a default configuration file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["autoscript"]).is_err());
    }

    #[test]
    fn test_cli_check_command() {
        let cli = Cli::try_parse_from(["autoscript", "check", "autos/center.txt"]).unwrap();
        match cli.command {
            Commands::Check { script, config } => {
                assert_eq!(script, PathBuf::from("autos/center.txt"));
                assert!(config.is_none());
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_run_with_options() {
        let cli = Cli::try_parse_from([
            "autoscript",
            "run",
            "--config",
            "robot.json",
            "--alliance",
            "BLUE",
            "--realtime",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                script,
                config,
                alliance,
                realtime,
            } => {
                assert!(script.is_none());
                assert_eq!(config, Some(PathBuf::from("robot.json")));
                assert_eq!(alliance, Some(Alliance::Blue));
                assert!(realtime);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_alliance() {
        assert!(Cli::try_parse_from(["autoscript", "run", "--alliance", "green"]).is_err());
    }

    #[test]
    fn test_cli_init_config() {
        let cli = Cli::try_parse_from(["autoscript", "init-config", "robot.json"]).unwrap();
        assert!(matches!(cli.command, Commands::InitConfig { .. }));
    }
}
