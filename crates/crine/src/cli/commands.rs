//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::store::Fields;

/// Parse a JSON document argument.
pub(crate) fn parse_json(input: &str) -> Result<Value, String> {
    serde_json::from_str(input).map_err(|e| format!("invalid JSON: {e}"))
}

/// Parse a JSON object argument into document fields.
pub(crate) fn parse_fields(input: &str) -> Result<Fields, String> {
    match parse_json(input)? {
        Value::Object(fields) => Ok(fields),
        other => Err(format!("expected a JSON object, got {other}")),
    }
}

/// Profile commands.
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the signed-in user's profile
    Show,

    /// Merge fields into the signed-in user's profile
    Set {
        /// Fields to merge, as a JSON object
        #[arg(value_parser = parse_fields)]
        fields: Fields,
    },
}

/// Customer commands.
#[derive(Debug, Subcommand)]
pub enum CustomersCommand {
    /// List customers, newest first
    List,

    /// Show one customer
    Get {
        /// Customer id
        id: String,
    },

    /// Add a customer (subject to the customer quota)
    Add {
        /// Customer fields, as a JSON object
        #[arg(value_parser = parse_fields)]
        fields: Fields,
    },

    /// Update fields of an existing customer
    Update {
        /// Customer id
        id: String,

        /// Fields to update, as a JSON object
        #[arg(value_parser = parse_fields)]
        fields: Fields,
    },

    /// Delete a customer
    Delete {
        /// Customer id
        id: String,
    },
}

/// Drawing commands.
#[derive(Debug, Subcommand)]
pub enum DrawingCommand {
    /// Show the drawing payload for a customer
    Get {
        /// Customer id
        customer: String,
    },

    /// Store a drawing for a customer, replacing any previous one
    Save {
        /// Customer id
        customer: String,

        /// Drawing payload, any JSON value
        #[arg(value_parser = parse_json)]
        data: Value,
    },

    /// Delete the drawing for a customer
    Delete {
        /// Customer id
        customer: String,
    },
}

/// Backup history commands.
#[derive(Debug, Subcommand)]
pub enum BackupsCommand {
    /// List recent backups, newest first
    List {
        /// Maximum number of entries (defaults to history.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Record a backup
    Save {
        /// Backup metadata, as a JSON object
        #[arg(value_parser = parse_fields)]
        info: Fields,
    },
}

/// Bug report command arguments.
#[derive(Debug, Args)]
pub struct BugReportCommand {
    /// Report fields, as a JSON object
    #[arg(value_parser = parse_fields)]
    pub report: Fields,
}

/// Public intake form commands.
#[derive(Debug, Subcommand)]
pub enum FormCommand {
    /// Submit an intake form (no sign-in required)
    Submit {
        /// Form fields, as a JSON object
        #[arg(value_parser = parse_fields)]
        fields: Fields,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
