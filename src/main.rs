use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use tinggi::{Cli, Service};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // stdout carries the JSON response only
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.app_config().context("Invalid configuration")?;

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("Failed to open input file: {:?}", cli.input))?;
    let filename = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let service = Service::new(&config);
    let (status, response) = service.respond(&filename, &bytes);

    let json = serde_json::to_string_pretty(&response).context("Failed to encode response")?;
    println!("{}", json);

    if status == 200 {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Request failed with status {}", status);
        Ok(ExitCode::FAILURE)
    }
}
