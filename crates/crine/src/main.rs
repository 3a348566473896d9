//! `crine` - CLI for the crine data-access layer
//!
//! This binary opens the local document store and runs one command as the
//! user named by `--uid`.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use crine::cli::{self, Cli, Command, ConfigCommand};
use crine::{init_logging, Client, ClientOptions, Config, SessionContext, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    if let Command::Config(config_cmd) = &cli.command {
        return handle_config(&config, config_cmd);
    }

    let database_path = config.database_path();
    let store = SqliteStore::open(&database_path)
        .with_context(|| format!("opening store at {}", database_path.display()))?;

    let session = SessionContext::new();
    session.publish(cli.principal());

    let client = Client::with_options(Arc::new(store), session, ClientOptions::from(&config));
    if let Some(output) = cli::execute(&client, &cli.command).await? {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Backend]");
                println!("  Project:            {}", config.backend.project_id);
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Quota]");
                println!(
                    "  Default max customers: {}",
                    config.quota.default_max_customers
                );
                println!();
                println!("[History]");
                println!("  Default limit:      {}", config.history.default_limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.clone().unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
