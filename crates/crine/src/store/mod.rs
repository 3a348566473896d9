//! Document store abstraction for crine.
//!
//! The client talks to its backend only through [`DocumentStore`], a small
//! set of document-hierarchy primitives. Backends own two capabilities the
//! client relies on: generating unique document ids and assigning
//! server-side write timestamps.
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`] keeps everything in process and is the usual test double.
//! - [`SqliteStore`] keeps the hierarchy in a local `SQLite` file.

pub mod clock;
pub mod memory;
pub mod path;
pub mod sqlite;

use std::cmp::Ordering;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use clock::ServerClock;
pub use memory::MemoryStore;
pub use path::{CollectionPath, DocumentPath};
pub use sqlite::SqliteStore;

/// The fields of a document, as stored.
pub type Fields = Map<String, Value>;

/// Errors reported by a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed document does not exist (only raised by operations that
    /// require one, such as [`DocumentStore::update`]).
    #[error("document not found: {path}")]
    NotFound {
        /// Path of the missing document.
        path: String,
    },

    /// The backend refused the operation.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// Path the operation targeted.
        path: String,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    Open {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to create the directory holding the database.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    Migration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored document could not be decoded.
    #[error("corrupt document at {path}: {source}")]
    Corrupt {
        /// Path of the unreadable document.
        path: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The document id (last path segment).
    pub id: String,
    /// The stored fields.
    pub fields: Fields,
}

impl Document {
    /// Look up a single field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// How [`DocumentStore::set`] treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Replace the whole document.
    #[default]
    Overwrite,
    /// Write only the given fields, keeping the rest. Nested objects merge
    /// recursively.
    Merge,
}

/// A write payload: caller fields plus fields the store stamps with its own
/// timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteData {
    fields: Fields,
    server_timestamps: Vec<String>,
}

impl WriteData {
    /// A payload carrying the given fields.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Set a single field, replacing any caller value with the same name.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Ask the store to fill `name` with its write timestamp.
    #[must_use]
    pub fn with_server_timestamp(mut self, name: impl Into<String>) -> Self {
        self.server_timestamps.push(name.into());
        self
    }

    /// The caller-supplied fields.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Names of the fields the store will stamp.
    #[must_use]
    pub fn server_timestamps(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Produce the fields to store, stamping every requested field with
    /// `timestamp`. Stamps win over caller fields of the same name.
    #[must_use]
    pub fn resolve(self, timestamp: &str) -> Fields {
        let mut fields = self.fields;
        for name in self.server_timestamps {
            fields.insert(name, Value::String(timestamp.to_string()));
        }
        fields
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Ordering clause of a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The field to order by.
    pub field: String,
    /// The sort direction.
    pub direction: Direction,
}

/// A collection query: optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Ordering clause. Documents missing the field are left out.
    pub order_by: Option<OrderBy>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    /// A query returning every document in id order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Order results by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Return at most `limit` documents.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter, sort and truncate a collection's documents.
    ///
    /// Ties on the order field are broken by ascending document id.
    #[must_use]
    pub fn apply(&self, mut documents: Vec<Document>) -> Vec<Document> {
        match &self.order_by {
            Some(order) => {
                documents.retain(|doc| doc.fields.contains_key(&order.field));
                documents.sort_by(|a, b| {
                    let by_field = compare_values(
                        a.get(&order.field).unwrap_or(&Value::Null),
                        b.get(&order.field).unwrap_or(&Value::Null),
                    );
                    let by_field = match order.direction {
                        Direction::Ascending => by_field,
                        Direction::Descending => by_field.reverse(),
                    };
                    by_field.then_with(|| a.id.cmp(&b.id))
                });
            }
            None => documents.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }
        documents
    }
}

/// Total order over field values: null, booleans, numbers, strings, arrays,
/// objects. Within a kind values compare naturally; arrays and objects
/// compare by their JSON text.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Merge `source` into `target`, recursing into objects present on both sides.
pub fn merge_fields(target: &mut Fields, source: Fields) {
    for (key, value) in source {
        let Value::Object(incoming) = value else {
            target.insert(key, value);
            continue;
        };
        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            merge_fields(existing, incoming);
            continue;
        }
        target.insert(key, Value::Object(incoming));
    }
}

/// Backend primitives for a hierarchical document store.
///
/// Every method is a single round trip. Implementations generate ids for
/// [`add`](Self::add) and fill server timestamps requested through
/// [`WriteData::with_server_timestamp`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// A short name for this backend (for logging).
    fn name(&self) -> &'static str;

    /// Fetch one document. Returns `None` if it does not exist.
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;

    /// Create or write a document.
    async fn set(&self, path: &DocumentPath, data: WriteData, mode: SetMode) -> StoreResult<()>;

    /// Update fields of an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(&self, path: &DocumentPath, data: WriteData) -> StoreResult<()>;

    /// Create a document with a generated id and return the id.
    async fn add(&self, collection: &CollectionPath, data: WriteData) -> StoreResult<String>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, path: &DocumentPath) -> StoreResult<()>;

    /// List a collection's documents.
    async fn query(&self, collection: &CollectionPath, query: &Query)
        -> StoreResult<Vec<Document>>;
}
