//! Durable disk-backed tier.
//!
//! Every entry is one file under the cache root, named by the escaped form
//! of its key (see [`object_key`]). A manifest of resident keys is rebuilt
//! from the directory listing on open, so the tier survives restarts.
//! Writes land on disk synchronously; this tier has no dirty bookkeeping.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arx_core::{CacheError, CacheResult};
use async_trait::async_trait;
use once_cell::sync::OnceCell;

use super::object_key;
use super::traits::{CacheStats, CacheTier};

/// File-per-entry cache tier rooted at a directory.
pub struct DiskTier {
    root: PathBuf,
    manifest: Mutex<BTreeSet<String>>,
    layer: OnceCell<Arc<dyn CacheTier>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DiskTier {
    /// Opens a cache rooted at `root`, creating the directory if needed,
    /// and rebuilds the key manifest from the files already present.
    ///
    /// Files whose names do not decode as escaped keys are left alone and
    /// never served.
    pub fn new(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::StoreUnavailable {
            path: root.clone(),
            source,
        })?;

        let mut manifest = BTreeSet::new();
        let dir = fs::read_dir(&root).map_err(|source| CacheError::StoreUnavailable {
            path: root.clone(),
            source,
        })?;
        for entry in dir {
            let entry = entry.map_err(|source| CacheError::StoreUnavailable {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        "Ignoring non-UTF-8 file name in cache root"
                    );
                    continue;
                }
            };
            match object_key::decode(&name) {
                Some(key) => {
                    manifest.insert(key);
                }
                None => {
                    tracing::warn!(file = %name, "Ignoring foreign file in cache root");
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            entries = manifest.len(),
            "Disk tier opened"
        );

        Ok(Self {
            root,
            manifest: Mutex::new(manifest),
            layer: OnceCell::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Directory holding the cache objects.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(object_key::encode(key))
    }

    fn lock_manifest(&self) -> CacheResult<MutexGuard<'_, BTreeSet<String>>> {
        self.manifest.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn write_object(
        &self,
        manifest: &mut BTreeSet<String>,
        key: &str,
        payload: &[u8],
    ) -> CacheResult<()> {
        fs::write(self.object_path(key), payload).map_err(|source| CacheError::Io {
            key: key.to_string(),
            source,
        })?;
        manifest.insert(key.to_string());
        Ok(())
    }

    async fn warm_up(&self, layer: &dyn CacheTier) -> CacheResult<usize> {
        let keys = match layer.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "Could not list downstream keys for warm-up");
                return Ok(0);
            }
        };

        let mut loaded = 0usize;
        for key in keys {
            match layer.get(&key).await {
                Ok(payload) => {
                    let mut manifest = self.lock_manifest()?;
                    match self.write_object(&mut manifest, &key, &payload) {
                        Ok(()) => loaded += 1,
                        Err(err) => {
                            tracing::warn!(
                                key = %key,
                                error = %err,
                                "Could not persist key during warm-up"
                            );
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Skipping key during warm-up");
                }
            }
        }

        tracing::info!(loaded, "Disk tier warm-up complete");
        Ok(loaded)
    }
}

#[async_trait]
impl CacheTier for DiskTier {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        {
            let mut manifest = self.lock_manifest()?;
            if manifest.contains(key) {
                match fs::read(self.object_path(key)) {
                    Ok(payload) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(payload);
                    }
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {
                        // Object vanished out from under the manifest.
                        manifest.remove(key);
                    }
                    Err(source) => {
                        return Err(CacheError::Io {
                            key: key.to_string(),
                            source,
                        })
                    }
                }
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let layer = match self.layer.get() {
            Some(layer) => Arc::clone(layer),
            None => {
                return Err(CacheError::NotFound {
                    key: key.to_string(),
                })
            }
        };
        let payload = layer.get(key).await?;

        // Promote onto disk so the next read is local.
        let mut manifest = self.lock_manifest()?;
        self.write_object(&mut manifest, key, &payload)?;
        Ok(payload)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let mut manifest = self.lock_manifest()?;
        self.write_object(&mut manifest, key, &value)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut manifest = self.lock_manifest()?;
        match fs::remove_file(self.object_path(key)) {
            Ok(()) => {
                manifest.remove(key);
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // The object is already gone; drop any stale manifest entry.
                if manifest.remove(key) {
                    Ok(())
                } else {
                    Err(CacheError::NotFound {
                        key: key.to_string(),
                    })
                }
            }
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn all_keys(&self) -> CacheResult<Vec<String>> {
        let manifest = self.lock_manifest()?;
        Ok(manifest.iter().cloned().collect())
    }

    async fn attach_layer(&self, layer: Arc<dyn CacheTier>, load: bool) -> CacheResult<()> {
        if self.layer.set(Arc::clone(&layer)).is_err() {
            return Err(CacheError::LayerAlreadyAttached);
        }
        tracing::info!(load, "Downstream layer attached to disk tier");

        if load {
            self.warm_up(layer.as_ref()).await?;
        }
        Ok(())
    }

    async fn activate_flush(&self, _interval: Duration) -> CacheResult<()> {
        if self.layer.get().is_none() {
            return Err(CacheError::NoLayer);
        }
        // Every write lands on disk synchronously, so there is nothing to
        // push on a timer.
        Ok(())
    }

    async fn write_through(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        {
            let mut manifest = self.lock_manifest()?;
            self.write_object(&mut manifest, key, &value)?;
        }

        match self.layer.get() {
            Some(layer) => layer.write_through(key, value).await,
            None => Ok(()),
        }
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let manifest = self.lock_manifest()?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: manifest.len() as u64,
            dirty_count: 0,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
