//! `crine` - Data access for a salon's customers, drawings and backups
//!
//! This library gates every read and write on the signed-in principal, lays
//! records out in a `users/{uid}/...` document hierarchy and enforces the
//! per-user customer quota. Storage is behind the [`DocumentStore`] trait,
//! with an in-memory and a SQLite backend.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;
pub mod store;

pub use client::{Client, ClientOptions};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{BackupHistoryEntry, Customer, Profile};
pub use session::{Principal, SessionContext};
pub use store::{DocumentStore, Fields, MemoryStore, SqliteStore, StoreError};
