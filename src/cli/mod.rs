//! CLI entry point for the courier agent.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ProcessingMode;

/// Currency conversion agent
#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Courier currency conversion agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent, reading envelopes on stdin and writing them to stdout
    Run(RunArgs),
    /// Answer one conversion query locally and exit
    Query(QueryArgs),
    /// Print the address derived from a seed
    Address(AddressArgs),
}

/// Arguments for `courier run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Processing mode (direct, delegated); overrides the config file
    #[arg(short, long)]
    pub mode: Option<ProcessingMode>,

    /// Do not start the REST endpoint
    #[arg(long)]
    pub no_rest: bool,
}

/// Arguments for `courier query`.
#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// Free text, e.g. "Convert 100 USD to EUR"
    pub text: String,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for `courier address`.
#[derive(Parser, Debug)]
pub struct AddressArgs {
    /// Seed; defaults to the configured one
    #[arg(short, long)]
    pub seed: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_run_with_defaults() {
        let cli = Cli::try_parse_from(["courier", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert!(args.config.is_none());
                assert!(args.mode.is_none());
                assert!(!args.no_rest);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn parse_run_with_mode_and_config() {
        let cli = Cli::try_parse_from([
            "courier",
            "run",
            "--config",
            "agent.toml",
            "--mode",
            "Delegated",
            "--no-rest",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, Some(PathBuf::from("agent.toml")));
                assert_eq!(args.mode, Some(ProcessingMode::Delegated));
                assert!(args.no_rest);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn parse_query_text() {
        let cli = Cli::try_parse_from(["courier", "query", "Convert 100 USD to EUR"]).unwrap();
        match cli.command {
            Commands::Query(args) => assert_eq!(args.text, "Convert 100 USD to EUR"),
            other => panic!("expected Query, got {other:?}"),
        }
    }

    #[test]
    fn parse_address_seed() {
        let cli = Cli::try_parse_from(["courier", "address", "-s", "my seed"]).unwrap();
        match cli.command {
            Commands::Address(args) => assert_eq!(args.seed.as_deref(), Some("my seed")),
            other => panic!("expected Address, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_mode_is_error() {
        assert!(Cli::try_parse_from(["courier", "run", "--mode", "psychic"]).is_err());
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["courier"]).is_err());
    }

    #[test]
    fn parse_query_missing_text_is_error() {
        assert!(Cli::try_parse_from(["courier", "query"]).is_err());
    }
}
