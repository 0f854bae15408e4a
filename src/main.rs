use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod commands;

use syspulse::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Logging settings come from the config file, so load it before tracing is up
    let cfg = syspulse::config::load_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    init_tracing(&cfg.server.log_level, &cfg.server.log_format);

    match args.get_command() {
        cli::Commands::Start => commands::start::execute(cfg).await?,
        cli::Commands::Serve => commands::serve::execute(cfg).await?,
        cli::Commands::Worker => commands::worker::execute(cfg).await?,
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&cfg)?,
            cli::ConfigCommands::Validate => commands::config::validate(&cfg)?,
        },
        cli::Commands::Version => {
            println!("SysPulse v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
