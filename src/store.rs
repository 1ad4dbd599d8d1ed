//! The identity store: one table, the narrow set of queries every other
//! component talks through.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("supersede conflict, retry")]
    SerializationConflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Init,
    Verified,
    Superseded,
    Revoked,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Init => "init",
            Status::Verified => "verified",
            Status::Superseded => "superseded",
            Status::Revoked => "revoked",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "verified" => Status::Verified,
            "superseded" => Status::Superseded,
            "revoked" => Status::Revoked,
            _ => Status::Init,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: String,
    pub root: String,
    pub document: Vec<u8>,
    pub signing_pubkey: String,
    pub encrypting_pubkey: String,
    pub secret_ciphertext: String,
    pub secret_nonce: String,
    pub secret_master_pubkey: String,
    pub challenge: String,
    pub status: Status,
    pub supersedes: Option<String>,
    pub superseded_by: Option<String>,
    pub superseded_at: Option<String>,
    pub agent_id: Option<String>,
    pub created: String,
    pub modified: String,
}

pub struct NewRecord {
    pub id: String,
    pub root: String,
    pub document: Vec<u8>,
    pub signing_pubkey: String,
    pub encrypting_pubkey: String,
    pub secret_ciphertext: String,
    pub secret_nonce: String,
    pub secret_master_pubkey: String,
    pub challenge: String,
    pub status: Status,
    pub supersedes: Option<String>,
    pub agent_id: Option<String>,
}

/// Handle onto the SQLite-backed identity store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS didstore (
                id                   TEXT PRIMARY KEY,
                root                 TEXT NOT NULL,
                document             BLOB NOT NULL,
                signing_pubkey       TEXT NOT NULL,
                encrypting_pubkey    TEXT NOT NULL,
                secret_ciphertext    TEXT NOT NULL,
                secret_nonce         TEXT NOT NULL,
                secret_master_pubkey TEXT NOT NULL,
                challenge            TEXT NOT NULL,
                status               TEXT NOT NULL,
                supersedes           TEXT,
                superseded_by        TEXT,
                superseded_at        TEXT,
                agent_id             TEXT,
                created              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                modified             TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
            );
            CREATE INDEX IF NOT EXISTS didstore_root_idx ON didstore(root);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(&self, rec: NewRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO didstore
                (id, root, document, signing_pubkey, encrypting_pubkey,
                 secret_ciphertext, secret_nonce, secret_master_pubkey,
                 challenge, status, supersedes, agent_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                rec.id,
                rec.root,
                rec.document,
                rec.signing_pubkey,
                rec.encrypting_pubkey,
                rec.secret_ciphertext,
                rec.secret_nonce,
                rec.secret_master_pubkey,
                rec.challenge,
                rec.status.as_str(),
                rec.supersedes,
                rec.agent_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, root, document, signing_pubkey, encrypting_pubkey,
                    secret_ciphertext, secret_nonce, secret_master_pubkey,
                    challenge, status, supersedes, superseded_by, superseded_at,
                    agent_id, created, modified
             FROM didstore WHERE id = ?1",
            params![id],
            row_to_record,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Newest record (by `created`) in the lineage rooted at `root`.
    pub fn get_newest_by_root(&self, root: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, root, document, signing_pubkey, encrypting_pubkey,
                    secret_ciphertext, secret_nonce, secret_master_pubkey,
                    challenge, status, supersedes, superseded_by, superseded_at,
                    agent_id, created, modified
             FROM didstore WHERE root = ?1 ORDER BY created DESC LIMIT 1",
            params![root],
            row_to_record,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Ordered (oldest first), `init` excluded: the full lineage history.
    pub fn get_history_by_root(&self, root: &str) -> Result<Vec<IdentityRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, root, document, signing_pubkey, encrypting_pubkey,
                    secret_ciphertext, secret_nonce, secret_master_pubkey,
                    challenge, status, supersedes, superseded_by, superseded_at,
                    agent_id, created, modified
             FROM didstore WHERE root = ?1 AND status != 'init' ORDER BY created ASC",
        )?;
        let rows = stmt
            .query_map(params![root], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_verified(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE didstore SET status = 'verified', modified = strftime('%Y-%m-%dT%H:%M:%fZ','now')
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn mark_revoked(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE didstore SET status = 'revoked', modified = strftime('%Y-%m-%dT%H:%M:%fZ','now')
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Flip the predecessor to `superseded` and the new record to `verified`
    /// in one serializable transaction. SQLite has no `SERIALIZABLE` isolation
    /// level; `BEGIN IMMEDIATE` takes the write lock up front so no other
    /// writer can interleave, which gives the same total order a Postgres
    /// `SERIALIZABLE` transaction would.
    pub fn confirm_supersede(&self, predecessor_id: &str, new_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let predecessor_status: Option<String> = tx
            .query_row(
                "SELECT status FROM didstore WHERE id = ?1",
                params![predecessor_id],
                |row| row.get(0),
            )
            .optional()?;
        if predecessor_status.as_deref() != Some("verified") {
            return Err(StoreError::SerializationConflict);
        }

        tx.execute(
            "UPDATE didstore
                SET status = 'superseded', superseded_by = ?1,
                    superseded_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
             WHERE id = ?2",
            params![new_id, predecessor_id],
        )?;
        tx.execute(
            "UPDATE didstore SET status = 'verified', modified = strftime('%Y-%m-%dT%H:%M:%fZ','now')
             WHERE id = ?1",
            params![new_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<IdentityRecord> {
    Ok(IdentityRecord {
        id: row.get(0)?,
        root: row.get(1)?,
        document: row.get(2)?,
        signing_pubkey: row.get(3)?,
        encrypting_pubkey: row.get(4)?,
        secret_ciphertext: row.get(5)?,
        secret_nonce: row.get(6)?,
        secret_master_pubkey: row.get(7)?,
        challenge: row.get(8)?,
        status: Status::parse(&row.get::<_, String>(9)?),
        supersedes: row.get(10)?,
        superseded_by: row.get(11)?,
        superseded_at: row.get(12)?,
        agent_id: row.get(13)?,
        created: row.get(14)?,
        modified: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, root: &str, status: Status) -> NewRecord {
        NewRecord {
            id: id.to_string(),
            root: root.to_string(),
            document: b"{}".to_vec(),
            signing_pubkey: "sig".to_string(),
            encrypting_pubkey: "enc".to_string(),
            secret_ciphertext: "ct".to_string(),
            secret_nonce: "nonce".to_string(),
            secret_master_pubkey: "master".to_string(),
            challenge: "chal".to_string(),
            status,
            supersedes: None,
            agent_id: None,
        }
    }

    #[test]
    fn insert_and_get_by_id() {
        let store = Store::open_memory().unwrap();
        store.insert(sample("did:jlinc:a", "did:jlinc:a", Status::Init)).unwrap();
        let rec = store.get_by_id("did:jlinc:a").unwrap().unwrap();
        assert_eq!(rec.status, Status::Init);
        assert_eq!(rec.root, "did:jlinc:a");
    }

    #[test]
    fn confirm_supersede_flips_both_records() {
        let store = Store::open_memory().unwrap();
        store.insert(sample("did:jlinc:a", "did:jlinc:a", Status::Verified)).unwrap();
        let mut successor = sample("did:jlinc:b", "did:jlinc:a", Status::Init);
        successor.supersedes = Some("did:jlinc:a".to_string());
        store.insert(successor).unwrap();

        store.confirm_supersede("did:jlinc:a", "did:jlinc:b").unwrap();

        let predecessor = store.get_by_id("did:jlinc:a").unwrap().unwrap();
        assert_eq!(predecessor.status, Status::Superseded);
        assert_eq!(predecessor.superseded_by.as_deref(), Some("did:jlinc:b"));

        let successor = store.get_by_id("did:jlinc:b").unwrap().unwrap();
        assert_eq!(successor.status, Status::Verified);
    }

    #[test]
    fn confirm_supersede_rejects_non_verified_predecessor() {
        let store = Store::open_memory().unwrap();
        store.insert(sample("did:jlinc:a", "did:jlinc:a", Status::Revoked)).unwrap();
        let mut successor = sample("did:jlinc:b", "did:jlinc:a", Status::Init);
        successor.supersedes = Some("did:jlinc:a".to_string());
        store.insert(successor).unwrap();

        let err = store.confirm_supersede("did:jlinc:a", "did:jlinc:b").unwrap_err();
        assert!(matches!(err, StoreError::SerializationConflict));
    }

    #[test]
    fn history_excludes_init_and_orders_by_created() {
        let store = Store::open_memory().unwrap();
        store.insert(sample("did:jlinc:a", "did:jlinc:a", Status::Superseded)).unwrap();
        store.insert(sample("did:jlinc:b", "did:jlinc:a", Status::Verified)).unwrap();
        store.insert(sample("did:jlinc:c", "did:jlinc:a", Status::Init)).unwrap();

        let history = store.get_history_by_root("did:jlinc:a").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.status != Status::Init));
    }
}
