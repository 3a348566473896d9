//! `SQLite` schema for the local document store.
//!
//! Every document lives in one row of `documents`, keyed by its full path.
//! The `collection` column holds the parent collection path so that listing
//! a collection is a single indexed lookup.

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create the documents table.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    path TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    data TEXT NOT NULL,
    written_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `collection` for listing.
pub const CREATE_COLLECTION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, doc_id)
";

/// Statements making up schema version 1.
pub const V1_STATEMENTS: &[&str] = &[CREATE_DOCUMENTS_TABLE, CREATE_COLLECTION_INDEX];
