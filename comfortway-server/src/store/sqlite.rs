//! SQLite-based document store

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;

use super::{Document, DocumentStore, Fields, Query, StoreResult};
use crate::crypto::generate_id;
use crate::error::ApiError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed document store, one row per document
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

fn db_error(e: rusqlite::Error) -> ApiError {
    ApiError::Upstream(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

fn encode(fields: &Fields) -> StoreResult<String> {
    serde_json::to_string(fields).map_err(|e| ApiError::Upstream(e.to_string()))
}

fn decode(body: &str) -> StoreResult<Fields> {
    match serde_json::from_str(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::Upstream("Stored document is not an object".to_string())),
        Err(e) => Err(ApiError::Upstream(format!("Malformed stored document: {}", e))),
    }
}

impl SqliteDocumentStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Upstream("database lock poisoned".to_string()))
    }

    fn migrate(conn: &Connection) -> StoreResult<()> {
        let current_version = Self::schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(db_error)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Current schema version, 0 for a fresh database
    fn schema_version(conn: &Connection) -> StoreResult<i32> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(db_error)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(db_error)
    }

    fn migrate_v1(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- seq preserves insertion order across collections
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                UNIQUE (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
        )
        .map_err(db_error)
    }

    fn read_body(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;

        body.as_deref().map(decode).transpose()
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        let id = generate_id();
        self.insert_with_id(collection, &id, fields).await
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> StoreResult<Document> {
        let body = encode(&fields)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id, body],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiError::AlreadyExists("Document".to_string())
            } else {
                db_error(e)
            }
        })?;

        Ok(Document::new(id, fields))
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        let body = encode(&fields)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body",
            params![collection, id, body],
        )
        .map_err(db_error)?;

        Ok(Document::new(id, fields))
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let conn = self.lock()?;
        Ok(Self::read_body(&conn, collection, id)?.map(|fields| Document::new(id, fields)))
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let rows: Vec<(String, String)> = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq")
                .map_err(db_error)?;
            let rows = stmt
                .query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(db_error)?;
            rows.collect::<Result<_, _>>().map_err(db_error)?
        };

        let docs = rows
            .into_iter()
            .map(|(id, body)| Ok(Document::new(id, decode(&body)?)))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(query.apply(docs))
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        let conn = self.lock()?;
        let mut current = Self::read_body(&conn, collection, id)?
            .ok_or_else(|| ApiError::NotFound("Document".to_string()))?;
        current.extend(fields);

        conn.execute(
            "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection, id, encode(&current)?],
        )
        .map_err(db_error)?;

        Ok(Document::new(id, current))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .map_err(db_error)?;
        Ok(rows > 0)
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")
            .map_err(db_error)?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(db_error)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(db_error)?;
        Ok(names)
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        Ok(count as u64)
    }
}
