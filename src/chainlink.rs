//! Append-only hash chain over accepted identity documents.
//!
//! One link per confirmed identity: `H(prev_link_bytes ‖ H(document_bytes))`.
//! The engine is the sole writer and never deletes or reorders a link.

use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::crypto;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization conflict, retry")]
    SerializationConflict,
}

pub struct ChainLog {
    conn: Mutex<Connection>,
    error_log_path: PathBuf,
}

impl ChainLog {
    pub fn open(path: &str, error_log_path: impl Into<PathBuf>) -> Result<Self, ChainError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, error_log_path)
    }

    pub fn open_memory(error_log_path: impl Into<PathBuf>) -> Result<Self, ChainError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, error_log_path)
    }

    fn from_connection(conn: Connection, error_log_path: impl Into<PathBuf>) -> Result<Self, ChainError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chainlinks (
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                id        TEXT NOT NULL,
                chainlink TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            error_log_path: error_log_path.into(),
        })
    }

    /// Append one link for `id` attesting `raw_document`. Called only after
    /// the identity insert has already committed. Failures are logged to the
    /// durable error log and swallowed — the caller's request has already
    /// succeeded from the client's point of view.
    pub fn append(&self, id: &str, raw_document: &[u8]) {
        if let Err(e) = self.try_append(id, raw_document) {
            tracing::error!(id, error = %e, "chainlink append failed");
            self.log_failure(id, &e.to_string());
        }
    }

    fn try_append(&self, id: &str, raw_document: &[u8]) -> Result<(), ChainError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let prev: Option<String> = tx
            .query_row(
                "SELECT chainlink FROM chainlinks ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let prev_bytes = match prev {
            Some(ref p) => crypto::base64url_decode(p).map_err(|_| ChainError::SerializationConflict)?,
            None => Vec::new(),
        };

        let doc_hash = crypto::sha256(raw_document);
        let mut preimage = Vec::with_capacity(prev_bytes.len() + doc_hash.len());
        preimage.extend_from_slice(&prev_bytes);
        preimage.extend_from_slice(&doc_hash);
        let new_link = crypto::sha256(&preimage);
        let encoded = crypto::base64url_encode(&new_link);

        tx.execute(
            "INSERT INTO chainlinks (id, chainlink) VALUES (?1, ?2)",
            params![id, encoded],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn log_failure(&self, id: &str, reason: &str) {
        if let Some(parent) = self.error_log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.error_log_path)
        {
            let _ = writeln!(file, "{id} : {reason}");
        }
    }

    #[cfg(test)]
    pub fn tip(&self) -> Option<String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT chainlink FROM chainlinks ORDER BY seq DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
    }
}
