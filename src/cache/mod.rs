//! Persistent cache of downloaded model files.
//!
//! Reads and writes are best-effort: a failing store degrades reads to a
//! cache miss and drops writes with a log line, so storage trouble can
//! slow a model load down but never fail it. Only the explicit clear
//! operation surfaces a storage error to the caller.

pub mod fetch;
pub mod store;

use crate::error::{Error, Result};
use fetch::{AssetFetcher, FetchProgress};
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use store::{BlobStore, StoredEntry};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub total_bytes: u64,
    pub entries: Vec<StoredEntry>,
}

pub struct AssetCache {
    db_path: PathBuf,
    store: OnceCell<Arc<BlobStore>>,
}

impl AssetCache {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            store: OnceCell::new(),
        }
    }

    /// The store is opened on first use and the handle kept for the life
    /// of the cache.
    fn store(&self) -> Option<&Arc<BlobStore>> {
        match self
            .store
            .get_or_try_init(|| BlobStore::open(&self.db_path).map(Arc::new))
        {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(
                    "Asset store unavailable at {}: {}",
                    self.db_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Cached bytes for `(model_id, filename)`, or `None`. Storage
    /// failures are logged and reported as a miss.
    pub fn get(&self, model_id: &str, filename: &str) -> Option<Vec<u8>> {
        let store = self.store()?;
        match store.get(model_id, filename) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache read failed for {}/{}: {}", model_id, filename, e);
                None
            }
        }
    }

    /// Write bytes back on a detached task. The caller already holds the
    /// bytes it needs, so the write is never awaited and its failure only
    /// logged.
    pub fn put_detached(&self, model_id: &str, filename: &str, bytes: Vec<u8>) {
        if let Some(store) = self.store() {
            let store = Arc::clone(store);
            let model_id = model_id.to_string();
            let filename = filename.to_string();
            tokio::spawn(async move {
                match store.put(&model_id, &filename, &bytes) {
                    Ok(()) => debug!("Cached {}/{} ({} bytes)", model_id, filename, bytes.len()),
                    Err(e) => warn!("Cache write failed for {}/{}: {}", model_id, filename, e),
                }
            });
        }
    }

    /// Return cached bytes for the key, or fetch them from the network.
    ///
    /// A hit involves no network access. On a miss the fetched bytes are
    /// returned directly and written back fire-and-forget; a failed fetch
    /// is fatal to the load and carries the filename.
    pub async fn get_or_fetch(
        &self,
        model_id: &str,
        filename: &str,
        remote_path: &str,
        fetcher: &dyn AssetFetcher,
        progress: &mut (dyn FnMut(FetchProgress) + Send),
    ) -> Result<Vec<u8>> {
        if let Some(bytes) = self.get(model_id, filename) {
            debug!("Cache hit for {}/{} ({} bytes)", model_id, filename, bytes.len());
            return Ok(bytes);
        }

        info!("Cache miss for {}/{}, fetching {}", model_id, filename, remote_path);
        let mut forward = |received: u64, total: Option<u64>| {
            progress(FetchProgress {
                filename: filename.to_string(),
                received,
                total,
            });
        };
        let bytes = fetcher
            .fetch(remote_path, &mut forward)
            .await
            .map_err(|e| Error::AssetFetch {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?;

        self.put_detached(model_id, filename, bytes.clone());
        Ok(bytes)
    }

    /// Read-only snapshot of what the store holds. A failing store yields
    /// an all-zero snapshot.
    pub fn stats(&self) -> CacheStats {
        let store = match self.store() {
            Some(store) => store,
            None => return CacheStats::default(),
        };
        match store.entries() {
            Ok(entries) => CacheStats {
                count: entries.len(),
                total_bytes: entries.iter().map(|e| e.size).sum(),
                entries,
            },
            Err(e) => {
                warn!("Cache stats unavailable: {}", e);
                CacheStats::default()
            }
        }
    }

    /// Remove every cached file. Explicit user action, so this one does
    /// surface storage errors.
    pub fn clear_all(&self) -> Result<usize> {
        let store = self
            .store()
            .ok_or_else(|| Error::CacheIo("store unavailable".to_string()))?;
        let removed = store
            .clear_all()
            .map_err(|e| Error::CacheIo(e.to_string()))?;
        info!("Cache cleared ({} entries removed)", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::fetch::AssetFetcher;
    use super::*;
    use futures_util::future::BoxFuture;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Fetcher serving canned bytes and recording every request.
    struct ScriptedFetcher {
        bytes: Vec<u8>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn serving(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl AssetFetcher for ScriptedFetcher {
        fn fetch<'a>(
            &'a self,
            path: &'a str,
            progress: &'a mut (dyn FnMut(u64, Option<u64>) + Send),
        ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(path.to_string());
                if self.fail {
                    anyhow::bail!("connection refused");
                }
                // Declared total is half the payload, like a compressed
                // transfer.
                let total = Some((self.bytes.len() / 2) as u64);
                progress(self.bytes.len() as u64, total);
                Ok(self.bytes.clone())
            })
        }
    }

    fn memory_cache() -> AssetCache {
        AssetCache::new(PathBuf::from(":memory:"))
    }

    #[tokio::test]
    async fn test_cache_or_fetch_fetches_once_then_hits() {
        let cache = memory_cache();
        let fetcher = ScriptedFetcher::serving(b"model-bytes");
        let mut progress = |_p: FetchProgress| {};

        let bytes = cache
            .get_or_fetch("modelA", "x.bin", "modelA/x.bin", &fetcher, &mut progress)
            .await
            .unwrap();
        assert_eq!(bytes, b"model-bytes");
        assert_eq!(fetcher.call_count(), 1);

        // Let the detached write-back land.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(cache.get("modelA", "x.bin").as_deref(), Some(&b"model-bytes"[..]));

        let bytes = cache
            .get_or_fetch("modelA", "x.bin", "modelA/x.bin", &fetcher, &mut progress)
            .await
            .unwrap();
        assert_eq!(bytes, b"model-bytes");
        assert_eq!(fetcher.call_count(), 1, "second load must not touch the network");
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_filename() {
        let cache = memory_cache();
        let mut fetcher = ScriptedFetcher::serving(b"");
        fetcher.fail = true;
        let mut progress = |_p: FetchProgress| {};

        let err = cache
            .get_or_fetch("modelA", "x.bin", "modelA/x.bin", &fetcher, &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssetFetch { ref filename, .. } if filename == "x.bin"));
    }

    #[tokio::test]
    async fn test_broken_store_still_loads_from_network() {
        // A store that can never open: reads degrade to misses and the
        // write-back is dropped, but the load itself succeeds.
        let cache = AssetCache::new(PathBuf::from("/nonexistent/dir/assets.sqlite"));
        let fetcher = ScriptedFetcher::serving(b"payload");
        let mut progress = |_p: FetchProgress| {};

        let bytes = cache
            .get_or_fetch("modelA", "x.bin", "modelA/x.bin", &fetcher, &mut progress)
            .await
            .unwrap();
        assert_eq!(bytes, b"payload");

        // Every load goes to the network, and stats degrade to zero.
        let bytes = cache
            .get_or_fetch("modelA", "x.bin", "modelA/x.bin", &fetcher, &mut progress)
            .await
            .unwrap();
        assert_eq!(bytes, b"payload");
        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(cache.stats().count, 0);
        assert!(cache.clear_all().is_err());
    }

    #[tokio::test]
    async fn test_progress_reports_filename_and_overshoot() {
        let cache = memory_cache();
        let fetcher = ScriptedFetcher::serving(b"0123456789");
        let mut seen = Vec::new();
        let mut progress = |p: FetchProgress| seen.push(p);

        cache
            .get_or_fetch("modelA", "x.bin", "modelA/x.bin", &fetcher, &mut progress)
            .await
            .unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].filename, "x.bin");
        assert_eq!(seen[0].received, 10);
        assert_eq!(seen[0].total, Some(5));
        // Raw fraction is 200%; display is clamped.
        assert_eq!(seen[0].display_percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let cache = memory_cache();
        let fetcher = ScriptedFetcher::serving(&[7u8; 32]);
        let mut progress = |_p: FetchProgress| {};

        cache
            .get_or_fetch("t1", "model.onnx", "ru-asr-t1/model.onnx", &fetcher, &mut progress)
            .await
            .unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_bytes, 32);
        assert_eq!(stats.entries[0].model_id, "t1");

        assert_eq!(cache.clear_all().unwrap(), 1);
        assert_eq!(cache.stats().count, 0);
    }
}
