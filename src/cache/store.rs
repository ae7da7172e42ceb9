//! SQLite-backed blob store for downloaded model files.
//!
//! One row per `(model_id, filename)` pair; re-fetching a file overwrites
//! its row. Rows are only ever removed by the explicit clear operation.

use anyhow::Result;
use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct StoredEntry {
    pub model_id: String,
    pub filename: String,
    pub size: u64,
    pub created_at: i64,
}

pub struct BlobStore {
    conn: Mutex<Connection>,
}

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE assets (
            model_id   TEXT NOT NULL,
            filename   TEXT NOT NULL,
            bytes      BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (model_id, filename)
        );",
    )])
}

impl BlobStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migrations().to_latest(&mut conn)?;
        debug!("Asset store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, model_id: &str, filename: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let bytes = conn
            .query_row(
                "SELECT bytes FROM assets WHERE model_id = ?1 AND filename = ?2",
                params![model_id, filename],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(bytes)
    }

    pub fn put(&self, model_id: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO assets (model_id, filename, bytes, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![model_id, filename, bytes, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Delete every entry, returning how many were removed.
    pub fn clear_all(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM assets", [])?;
        Ok(removed)
    }

    pub fn entries(&self) -> Result<Vec<StoredEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT model_id, filename, length(bytes), created_at
             FROM assets ORDER BY model_id, filename",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredEntry {
                model_id: row.get(0)?,
                filename: row.get(1)?,
                size: row.get::<_, i64>(2)? as u64,
                created_at: row.get(3)?,
            })
        })?;
        let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn memory_store() -> BlobStore {
        BlobStore::open(&PathBuf::from(":memory:")).unwrap()
    }

    #[test]
    fn test_get_put_roundtrip() {
        let store = memory_store();
        assert!(store.get("t1", "model.onnx").unwrap().is_none());

        store.put("t1", "model.onnx", b"onnx-bytes").unwrap();
        assert_eq!(
            store.get("t1", "model.onnx").unwrap().as_deref(),
            Some(&b"onnx-bytes"[..])
        );
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let store = memory_store();
        store.put("t1", "model.onnx", b"first").unwrap();
        store.put("t1", "model.onnx", b"second").unwrap();

        assert_eq!(
            store.get("t1", "model.onnx").unwrap().as_deref(),
            Some(&b"second"[..])
        );
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_clear_all_removes_everything() {
        let store = memory_store();
        store.put("t1", "model.onnx", b"a").unwrap();
        store.put("t1", "tokens.txt", b"bb").unwrap();
        store.put("vosk", "decoder.onnx", b"ccc").unwrap();

        assert_eq!(store.clear_all().unwrap(), 3);
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_entries_report_sizes() {
        let store = memory_store();
        store.put("vosk", "tokens.txt", &[0u8; 128]).unwrap();
        store.put("vosk", "decoder.onnx", &[0u8; 64]).unwrap();

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 2);
        let total: u64 = entries.iter().map(|e| e.size).sum();
        assert_eq!(total, 192);
        assert!(entries.iter().all(|e| e.created_at > 0));
    }
}
