//! Command-line interface for crine.
//!
//! This module provides the CLI structure and the dispatcher that maps
//! parsed commands onto [`Client`] calls for the `crine` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::client::Client;
use crate::error::Result;
use crate::session::Principal;

pub use commands::{
    BackupsCommand, BugReportCommand, ConfigCommand, CustomersCommand, DrawingCommand,
    FormCommand, ProfileCommand,
};

/// crine - Customer records, drawings and backups for a salon workbook
///
/// Reads and writes the local document store as the user named by `--uid`.
#[derive(Debug, Parser)]
#[command(name = "crine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Act as this user id
    #[arg(long, global = true, value_name = "UID")]
    pub uid: Option<String>,

    /// Email of the acting user
    #[arg(long, global = true, requires = "uid", value_name = "EMAIL")]
    pub email: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read or update the user profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage customers
    #[command(subcommand)]
    Customers(CustomersCommand),

    /// Manage customer drawings
    #[command(subcommand)]
    Drawing(DrawingCommand),

    /// Record and list backups
    #[command(subcommand)]
    Backups(BackupsCommand),

    /// File a bug report
    BugReport(BugReportCommand),

    /// Public intake forms
    #[command(subcommand)]
    Form(FormCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// The principal named by `--uid` and `--email`, if any.
    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.uid
            .as_ref()
            .map(|uid| Principal::new(uid.clone(), self.email.clone()))
    }
}

/// Run a data command against `client` and return its JSON output.
///
/// `config` commands need no client and are answered with `None`; the
/// binary handles them itself.
///
/// # Errors
///
/// Returns whatever error the underlying client call returns.
pub async fn execute(client: &Client, command: &Command) -> Result<Option<Value>> {
    let output = match command {
        Command::Profile(cmd) => match cmd {
            ProfileCommand::Show => serde_json::to_value(client.get_user_profile().await?)?,
            ProfileCommand::Set { fields } => {
                client.set_user_profile(fields.clone()).await?;
                json!({ "updated": true })
            }
        },
        Command::Customers(cmd) => match cmd {
            CustomersCommand::List => serde_json::to_value(client.get_customers().await?)?,
            CustomersCommand::Get { id } => serde_json::to_value(client.get_customer(id).await?)?,
            CustomersCommand::Add { fields } => {
                let id = client.add_customer(fields.clone()).await?;
                json!({ "id": id })
            }
            CustomersCommand::Update { id, fields } => {
                client.update_customer(id, fields.clone()).await?;
                json!({ "id": id, "updated": true })
            }
            CustomersCommand::Delete { id } => {
                client.delete_customer(id).await?;
                json!({ "id": id, "deleted": true })
            }
        },
        Command::Drawing(cmd) => match cmd {
            DrawingCommand::Get { customer } => {
                client.get_drawing(customer).await?.unwrap_or(Value::Null)
            }
            DrawingCommand::Save { customer, data } => {
                client.save_drawing(customer, data.clone()).await?;
                json!({ "customerId": customer, "saved": true })
            }
            DrawingCommand::Delete { customer } => {
                client.delete_drawing(customer).await?;
                json!({ "customerId": customer, "deleted": true })
            }
        },
        Command::Backups(cmd) => match cmd {
            BackupsCommand::List { limit } => {
                serde_json::to_value(client.get_backup_history(*limit).await?)?
            }
            BackupsCommand::Save { info } => {
                let id = client.save_backup_history(info.clone()).await?;
                json!({ "id": id })
            }
        },
        Command::BugReport(cmd) => {
            let id = client.save_bug_report(cmd.report.clone()).await?;
            json!({ "id": id })
        }
        Command::Form(FormCommand::Submit { fields }) => {
            let id = client.save_customer_form(fields.clone()).await?;
            json!({ "id": id })
        }
        Command::Config(_) => return Ok(None),
    };
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::SessionContext;
    use crate::store::MemoryStore;
    use clap::CommandFactory;
    use std::sync::Arc;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn client_for(cli: &Cli) -> Client {
        let session = SessionContext::new();
        session.publish(cli.principal());
        Client::new(Arc::new(MemoryStore::new()), session)
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "crine");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(
            parse(&["crine", "-q", "customers", "list"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["crine", "customers", "list"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["crine", "-v", "customers", "list"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["crine", "-vv", "customers", "list"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["crine", "-c", "/custom/config.toml", "config", "path"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_principal_from_flags() {
        let cli = parse(&[
            "crine",
            "--uid",
            "u1",
            "--email",
            "ada@example.com",
            "profile",
            "show",
        ]);
        assert_eq!(
            cli.principal(),
            Some(Principal::new("u1", Some("ada@example.com".to_string())))
        );

        let cli = parse(&["crine", "profile", "show"]);
        assert!(cli.principal().is_none());
    }

    #[test]
    fn test_email_requires_uid() {
        let result = Cli::try_parse_from(["crine", "--email", "a@b.c", "profile", "show"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        let result = Cli::try_parse_from(["crine", "customers", "add", "[1]"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_drawing_save() {
        let cli = parse(&["crine", "drawing", "save", "c1", r#"{"strokes": []}"#]);
        assert!(matches!(
            cli.command,
            Command::Drawing(DrawingCommand::Save { .. })
        ));
    }

    #[test]
    fn test_parse_backups_limit() {
        let cli = parse(&["crine", "backups", "list", "--limit", "3"]);
        assert!(matches!(
            cli.command,
            Command::Backups(BackupsCommand::List { limit: Some(3) })
        ));
    }

    #[tokio::test]
    async fn test_execute_customer_flow() {
        let cli = parse(&["crine", "--uid", "u1", "customers", "add", r#"{"name": "A"}"#]);
        let client = client_for(&cli);

        let added = execute(&client, &cli.command).await.unwrap().unwrap();
        let id = added["id"].as_str().unwrap().to_string();

        let list = parse(&["crine", "customers", "list"]);
        let listed = execute(&client, &list.command).await.unwrap().unwrap();
        assert_eq!(listed[0]["id"], json!(id));
        assert_eq!(listed[0]["name"], json!("A"));
    }

    #[tokio::test]
    async fn test_execute_form_without_uid() {
        let cli = parse(&["crine", "form", "submit", r#"{"name": "X"}"#]);
        let client = client_for(&cli);

        let output = execute(&client, &cli.command).await.unwrap().unwrap();
        assert!(output["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_execute_requires_uid() {
        let cli = parse(&["crine", "profile", "show"]);
        let client = client_for(&cli);

        let err = execute(&client, &cli.command).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn test_execute_missing_drawing_is_null() {
        let cli = parse(&["crine", "--uid", "u1", "drawing", "get", "c1"]);
        let client = client_for(&cli);

        let output = execute(&client, &cli.command).await.unwrap();
        assert_eq!(output, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_execute_config_is_not_dispatched() {
        let cli = parse(&["crine", "config", "path"]);
        let client = client_for(&cli);

        assert!(execute(&client, &cli.command).await.unwrap().is_none());
    }
}
