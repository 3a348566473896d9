//! Local `SQLite`-backed document store.
//!
//! Mirrors the document hierarchy of the managed backend in a single file so
//! the client can run without network access. Documents are stored as JSON
//! text; ordering and limits are applied after loading a collection.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use super::clock::{new_document_id, ServerClock};
use super::{
    merge_fields, CollectionPath, Document, DocumentPath, DocumentStore, Fields, Query, SetMode,
    StoreError, StoreResult, WriteData,
};

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Document store kept in a local `SQLite` database.
///
/// Read-modify-write operations take the write lock up front, so several
/// processes can share one database file.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    clock: ServerClock,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    StoreError::DirectoryCreate {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        debug!("Opening document store at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::initialize_schema(&mut conn)?;

        info!("Document store opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
            clock: ServerClock::new(),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
            clock: ServerClock::new(),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count the documents stored across all collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn document_count(&self) -> StoreResult<i64> {
        let count = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    fn read_fields(conn: &Connection, path: &str) -> StoreResult<Option<Fields>> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|text| decode(path, &text)).transpose()
    }

    fn write_fields(
        conn: &Connection,
        path: &DocumentPath,
        fields: &Fields,
        written_at: &str,
    ) -> StoreResult<()> {
        let data = serde_json::to_string(fields).map_err(|source| StoreError::Corrupt {
            path: path.to_string(),
            source,
        })?;
        conn.execute(
            r"
            INSERT OR REPLACE INTO documents (path, collection, doc_id, data, written_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                path.to_string(),
                path.parent().to_string(),
                path.id(),
                data,
                written_at,
            ],
        )?;
        Ok(())
    }
}

fn decode(path: &str, text: &str) -> StoreResult<Fields> {
    serde_json::from_str(text).map_err(|source| StoreError::Corrupt {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock();
        let fields = Self::read_fields(&conn, &path.to_string())?;
        Ok(fields.map(|fields| Document {
            id: path.id().to_string(),
            fields,
        }))
    }

    async fn set(&self, path: &DocumentPath, data: WriteData, mode: SetMode) -> StoreResult<()> {
        let now = self.clock.now_string();
        let incoming = data.resolve(&now);

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let fields = match mode {
            SetMode::Overwrite => incoming,
            SetMode::Merge => match Self::read_fields(&tx, &path.to_string())? {
                Some(mut existing) => {
                    merge_fields(&mut existing, incoming);
                    existing
                }
                None => incoming,
            },
        };
        Self::write_fields(&tx, path, &fields, &now)?;
        tx.commit()?;

        debug!("set {} ({:?})", path, mode);
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, data: WriteData) -> StoreResult<()> {
        let now = self.clock.now_string();

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut fields =
            Self::read_fields(&tx, &path.to_string())?.ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })?;
        fields.extend(data.resolve(&now));
        Self::write_fields(&tx, path, &fields, &now)?;
        tx.commit()?;

        debug!("updated {}", path);
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, data: WriteData) -> StoreResult<String> {
        let now = self.clock.now_string();
        let fields = data.resolve(&now);

        let conn = self.conn.lock();
        let id = new_document_id();
        let path = collection.generated_doc(&id);
        Self::write_fields(&conn, &path, &fields, &now)?;

        debug!("added {}", path);
        Ok(id)
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM documents WHERE path = ?1", [path.to_string()])?;
        debug!("deleted {} ({} rows)", path, affected);
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> StoreResult<Vec<Document>> {
        let collection = collection.to_string();
        let rows: Vec<(String, String)> = {
            let conn = self.conn.lock();
            let mut stmt =
                conn.prepare("SELECT doc_id, data FROM documents WHERE collection = ?1")?;
            let rows = stmt
                .query_map([&collection], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let documents = rows
            .into_iter()
            .map(|(id, text)| {
                let fields = decode(&format!("{collection}/{id}"), &text)?;
                Ok(Document { id, fields })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(query.apply(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;
    use serde_json::{json, Value};

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    fn history() -> CollectionPath {
        CollectionPath::root("users")
            .unwrap()
            .doc("u1")
            .unwrap()
            .collection("backupHistory")
            .unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_path() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = create_test_store();
        let path = DocumentPath::parse("users/u1").unwrap();

        store
            .set(
                &path,
                WriteData::new(fields(json!({"name": "Ada", "tags": ["a", "b"]}))),
                SetMode::Overwrite,
            )
            .await
            .unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.id, "u1");
        assert_eq!(
            Value::Object(doc.fields),
            json!({"name": "Ada", "tags": ["a", "b"]})
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = create_test_store();
        let path = DocumentPath::parse("users/nobody").unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_preserves_existing_fields() {
        let store = create_test_store();
        let path = DocumentPath::parse("users/u1").unwrap();

        store
            .set(&path, WriteData::new(fields(json!({"maxCustomers": 50}))), SetMode::Overwrite)
            .await
            .unwrap();
        store
            .set(
                &path,
                WriteData::new(fields(json!({"shopName": "Salon"})))
                    .with_server_timestamp("updatedAt"),
                SetMode::Merge,
            )
            .await
            .unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.get("maxCustomers"), Some(&json!(50)));
        assert_eq!(doc.get("shopName"), Some(&json!("Salon")));
        assert!(doc.get("updatedAt").is_some());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = create_test_store();
        let path = DocumentPath::parse("users/u1/customers/ghost").unwrap();

        let err = store
            .update(&path, WriteData::new(fields(json!({"a": 1}))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_query_and_limit() {
        let store = create_test_store();
        let mut ids = Vec::new();
        for n in 0..4 {
            let id = store
                .add(
                    &history(),
                    WriteData::new(fields(json!({"n": n}))).with_server_timestamp("createdAt"),
                )
                .await
                .unwrap();
            ids.push(id);
        }

        let docs = store
            .query(
                &history(),
                &Query::new()
                    .order_by("createdAt", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, ids[3]);
        assert_eq!(docs[1].id, ids[2]);
    }

    #[tokio::test]
    async fn test_query_does_not_include_subcollections() {
        let store = create_test_store();
        store
            .set(
                &DocumentPath::parse("users/u1").unwrap(),
                WriteData::new(Fields::new()),
                SetMode::Overwrite,
            )
            .await
            .unwrap();
        store
            .add(&history(), WriteData::new(Fields::new()))
            .await
            .unwrap();

        let users = CollectionPath::root("users").unwrap();
        let docs = store.query(&users, &Query::new()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "u1");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = create_test_store();
        let path = DocumentPath::parse("users/u1/drawings/c1").unwrap();
        store
            .set(&path, WriteData::new(Fields::new()), SetMode::Overwrite)
            .await
            .unwrap();

        store.delete(&path).await.unwrap();
        store.delete(&path).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_file_based_persists() {
        let db_path = std::env::temp_dir().join(format!(
            "crine_store_test_{}/nested/documents.db",
            std::process::id()
        ));
        let root = db_path.parent().and_then(Path::parent).map(Path::to_path_buf);
        if let Some(root) = &root {
            let _ = std::fs::remove_dir_all(root);
        }

        let path = DocumentPath::parse("customerForms/f1").unwrap();
        {
            let store = SqliteStore::open(&db_path).unwrap();
            assert_eq!(store.path(), db_path);
            store
                .set(&path, WriteData::new(fields(json!({"name": "X"}))), SetMode::Overwrite)
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&db_path).unwrap();
        let doc = reopened.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("X")));

        drop(reopened);
        if let Some(root) = &root {
            let _ = std::fs::remove_dir_all(root);
        }
    }

    #[tokio::test]
    async fn test_two_handles_share_one_file() {
        let db_path = std::env::temp_dir().join(format!(
            "crine_shared_test_{}/documents.db",
            std::process::id()
        ));
        let root = db_path.parent().map(Path::to_path_buf);
        if let Some(root) = &root {
            let _ = std::fs::remove_dir_all(root);
        }

        let first = SqliteStore::open(&db_path).unwrap();
        let second = SqliteStore::open(&db_path).unwrap();
        let path = DocumentPath::parse("users/u1").unwrap();

        first
            .set(&path, WriteData::new(fields(json!({"a": 1}))), SetMode::Merge)
            .await
            .unwrap();
        second
            .set(&path, WriteData::new(fields(json!({"b": 2}))), SetMode::Merge)
            .await
            .unwrap();
        first
            .update(&path, WriteData::new(fields(json!({"c": 3}))))
            .await
            .unwrap();

        let doc = second.get(&path).await.unwrap().unwrap();
        assert_eq!(Value::Object(doc.fields), json!({"a": 1, "b": 2, "c": 3}));

        drop(first);
        drop(second);
        if let Some(root) = &root {
            let _ = std::fs::remove_dir_all(root);
        }
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let store = create_test_store();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO documents (path, collection, doc_id, data, written_at) VALUES ('users/bad', 'users', 'bad', 'not json', '')",
                [],
            )
            .unwrap();

        let err = store
            .get(&DocumentPath::parse("users/bad").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
