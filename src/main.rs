//! Conclave CLI entry point
//!
//! - `conclave run <query>` - Research a topic and write a report
//! - `conclave agents` - List the registered providers
//! - `conclave graph` - Print the pipeline
//! - `conclave config` - Show or validate configuration

use anyhow::Context;
use conclave::cli::{commands, output::Output, run_options, Cli, Commands};
use conclave::utils::{config::ConclaveConfig, logging::init_tracing};
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Commands::Config { validate } = cli.command {
        let loaded = ConclaveConfig::read_or_default(&cli.config);
        return Ok(commands::config(&cli.config, loaded, validate, &output));
    }

    let config = ConclaveConfig::load_or_default(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_tracing(level, config.logging.json);

    match cli.command {
        Commands::Run {
            query,
            no_news,
            deep_search,
            format,
            json,
        } => {
            let options = run_options(no_news, deep_search, format);
            Ok(commands::run(&config, &output, &query, options, json).await?)
        }
        Commands::Agents => {
            commands::agents(&config, &output).await?;
            Ok(true)
        }
        Commands::Graph => {
            commands::graph(&config, &output).await?;
            Ok(true)
        }
        Commands::Config { .. } => Ok(true),
    }
}
