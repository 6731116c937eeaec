//! Orcl CLI: keys, DIDs, credentials and presentations against a `did:orcl`
//! ledger.
//!
//! Subcommands: keygen, did, issue, verify, present, verify-presentation,
//! demo.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use orcl_core::{AgentConfig, LoggingConfig};

/// Orcl: verifiable credentials over a DID ledger.
#[derive(Parser, Debug)]
#[command(name = "orcl", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "orcl.toml", global = true)]
    config: PathBuf,

    /// Override the ledger base URL.
    #[arg(long, global = true)]
    ledger_url: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write a default config file and exit.
    #[arg(long)]
    init: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 key pair.
    Keygen(commands::keygen::KeygenArgs),
    /// Create, resolve or deactivate DIDs.
    #[command(subcommand)]
    Did(commands::did::DidCommand),
    /// Issue a verifiable credential.
    Issue(commands::issue::IssueArgs),
    /// Verify a verifiable credential.
    Verify(commands::verify::VerifyArgs),
    /// Sign a presentation of held credentials.
    Present(commands::present::PresentArgs),
    /// Verify a signed presentation.
    VerifyPresentation(commands::present::VerifyPresentationArgs),
    /// Run issuance and a proof exchange between three in-process agents.
    Demo(commands::demo::DemoArgs),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.init {
        let config = AgentConfig::default();
        config::save(&config, &cli.config)?;
        println!("Wrote default config to {}", cli.config.display());
        return Ok(());
    }

    let mut config = config::load(&cli.config)?;
    if let Some(url) = cli.ledger_url {
        config.ledger.network = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging);

    let Some(command) = cli.command else {
        anyhow::bail!("no subcommand given; see `orcl --help`");
    };

    match command {
        Commands::Keygen(args) => commands::keygen::run(&args),
        Commands::Did(cmd) => commands::did::run(cmd, &config).await,
        Commands::Issue(args) => commands::issue::run(&args, &config).await,
        Commands::Verify(args) => commands::verify::run(&args, &config).await,
        Commands::Present(args) => commands::present::run(&args, &config).await,
        Commands::VerifyPresentation(args) => commands::present::run_verify(&args, &config).await,
        Commands::Demo(args) => commands::demo::run(&args, &config).await,
    }
}
