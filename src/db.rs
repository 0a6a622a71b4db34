use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::utils;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("digest store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("digest store task failed: {0}")]
    Task(String),
}

/// Delivery record of one digest send slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestDelivery {
    pub dedup_key: String,
    pub claimed_at_utc: String,
    pub sent_at_utc: Option<String>,
    pub content_hash: Option<String>,
    pub item_count: Option<i64>,
}

/// Idempotency keys for digest sends, one row per local send minute.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        utils::ensure_parent(path);
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS digest_sends(
                dedup_key TEXT PRIMARY KEY,
                claimed_at_utc TEXT NOT NULL,
                sent_at_utc TEXT,
                content_hash TEXT,
                item_count INTEGER
            );",
        )?;
        Ok(())
    }

    /// Atomically takes `dedup_key`. `false` means another run already holds
    /// or completed it.
    pub fn claim(&self, dedup_key: &str) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO digest_sends (dedup_key, claimed_at_utc) VALUES (?1, ?2)",
            params![dedup_key, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    /// Drops an unsent claim so a retry in the same minute can deliver.
    pub fn release(&self, dedup_key: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM digest_sends WHERE dedup_key = ?1 AND sent_at_utc IS NULL",
            params![dedup_key],
        )?;
        Ok(())
    }

    pub fn mark_sent(
        &self,
        dedup_key: &str,
        subject: &str,
        body: &str,
        item_count: usize,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO digest_sends (dedup_key, claimed_at_utc, sent_at_utc, content_hash, item_count)
             VALUES (?1, ?2, ?2, ?3, ?4)
             ON CONFLICT(dedup_key) DO UPDATE SET
               sent_at_utc = excluded.sent_at_utc,
               content_hash = excluded.content_hash,
               item_count = excluded.item_count",
            params![dedup_key, now, content_hash(subject, body), item_count as i64],
        )?;
        Ok(())
    }

    pub fn delivery(&self, dedup_key: &str) -> Result<Option<DigestDelivery>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT dedup_key, claimed_at_utc, sent_at_utc, content_hash, item_count
                 FROM digest_sends WHERE dedup_key = ?1",
                params![dedup_key],
                |row| {
                    Ok(DigestDelivery {
                        dedup_key: row.get(0)?,
                        claimed_at_utc: row.get(1)?,
                        sent_at_utc: row.get(2)?,
                        content_hash: row.get(3)?,
                        item_count: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

pub fn content_hash(subject: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(b"\n");
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_for_same_minute_is_refused() {
        let store = Store::open_in_memory().expect("store");
        assert!(store.claim("2026-03-01 08:00").expect("claim"));
        assert!(!store.claim("2026-03-01 08:00").expect("claim"));
        assert!(store.claim("2026-03-01 13:30").expect("claim"));
    }

    #[test]
    fn released_claim_can_be_retaken() {
        let store = Store::open_in_memory().expect("store");
        assert!(store.claim("2026-03-01 08:00").expect("claim"));
        store.release("2026-03-01 08:00").expect("release");
        assert!(store.delivery("2026-03-01 08:00").expect("lookup").is_none());
        assert!(store.claim("2026-03-01 08:00").expect("claim"));
    }

    #[test]
    fn sent_rows_survive_release_and_record_hash() {
        let store = Store::open_in_memory().expect("store");
        store.claim("2026-03-01 17:00").expect("claim");
        store
            .mark_sent("2026-03-01 17:00", "CCF Today", "body", 4)
            .expect("mark sent");
        store.release("2026-03-01 17:00").expect("release");

        let delivery = store
            .delivery("2026-03-01 17:00")
            .expect("lookup")
            .expect("row kept");
        assert!(delivery.sent_at_utc.is_some());
        assert_eq!(delivery.item_count, Some(4));
        assert_eq!(delivery.content_hash, Some(content_hash("CCF Today", "body")));
        assert_eq!(content_hash("CCF Today", "body").len(), 64);
    }

    #[test]
    fn file_backed_store_persists_claims() {
        let path = std::env::temp_dir().join(format!(
            "studio-events-store-{}-{}.sqlite",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        {
            let store = Store::open(&path).expect("open");
            assert!(store.claim("2026-03-01 08:00").expect("claim"));
        }
        let reopened = Store::open(&path).expect("reopen");
        assert!(!reopened.claim("2026-03-01 08:00").expect("claim"));
        let _ = std::fs::remove_file(&path);
    }
}
