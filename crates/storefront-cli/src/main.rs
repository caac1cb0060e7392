mod cli;
mod commands;
mod error;

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use storefront_core::ClientConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("storefront_core=warn,storefront=warn"),
        1 => EnvFilter::new("storefront_core=info,storefront=info"),
        _ => EnvFilter::new("storefront_core=debug,storefront=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&cli)?;
    debug!(base_url = %config.base_url, "configuration resolved");

    let output = commands::run(&cli.command, &config).await?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(ExitCode::SUCCESS)
}

/// Environment first, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(max_retries) = cli.max_retries {
        config = config.with_max_retries(max_retries);
    }
    config.validate()?;
    Ok(config)
}
