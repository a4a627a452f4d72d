//! bookgate - admission gateway for the booking application

use bookgate::config::Config;
use bookgate::server;
use bookgate::utils::logging::init_tracing;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "bookgate", version, about = "Endpoint-classified admission gateway")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "BOOKGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // alternate form prints the whole context chain
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = Config::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.gateway.server.host = host;
    }
    if let Some(port) = args.port {
        config.gateway.server.port = port;
    }
    config
        .validate()
        .context("Invalid command line overrides")?;

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_tracing(config.logging()).context("Failed to initialise logging")?;

    server::run_server(config).await?;
    Ok(())
}
