//! CLI module for conclave
//!
//! Provides command-line interface parsing and handling for the conclave binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use crate::workflows::{OutputFormat, WorkflowOptions};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// conclave - multi-agent research pipeline
///
/// Runs a research, analysis and synthesis pipeline over a query and writes
/// the resulting report to disk.
#[derive(Parser, Debug)]
#[command(
    name = "conclave",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "conclave - multi-agent research pipeline",
    after_help = "EXAMPLES:\n    \
                  conclave run \"solid state batteries\"            # Research a topic\n    \
                  conclave run \"edge AI\" --deep-search --json     # Fetch pages, print JSON\n    \
                  conclave agents                                  # List providers\n    \
                  conclave config --validate                       # Check conclave.toml"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "conclave.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a query and write a report
    Run {
        /// What to research
        query: String,

        /// Skip the news search
        #[arg(long)]
        no_news: bool,

        /// Fetch the top pages in full
        #[arg(long)]
        deep_search: bool,

        /// Report format
        #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
        format: FormatArg,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered providers and their capabilities
    Agents,

    /// Print the pipeline diagram
    Graph,

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Markdown,
    Html,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Html => OutputFormat::Html,
        }
    }
}

/// Run options from the `run` flags
pub fn run_options(no_news: bool, deep_search: bool, format: FormatArg) -> WorkflowOptions {
    WorkflowOptions {
        include_news: !no_news,
        deep_search,
        output_format: format.into(),
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "conclave",
            "run",
            "grid storage",
            "--no-news",
            "--format",
            "html",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                query,
                no_news,
                deep_search,
                format,
                json,
            } => {
                assert_eq!(query, "grid storage");
                let options = run_options(no_news, deep_search, format);
                assert!(!options.include_news);
                assert!(!options.deep_search);
                assert_eq!(options.output_format, OutputFormat::Html);
                assert!(json);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("conclave.toml"));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["conclave", "graph", "--config", "alt.toml", "--no-color", "-v"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Graph));
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(cli.no_color);
        assert!(cli.verbose);
    }

    #[test]
    fn test_run_requires_query() {
        assert!(Cli::try_parse_from(["conclave", "run"]).is_err());
    }
}
