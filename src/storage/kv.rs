use std::collections::HashMap as StdHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::KvBackend;
use crate::error::BackendError;

const SNAPSHOT_VERSION: u32 = 1;

type Namespaces = StdHashMap<String, StdHashMap<Vec<u8>, Vec<u8>>>;

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PersistenceSettings {
    /// Snapshot file; `None` keeps the backend purely in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Interval in milliseconds between background snapshots
    #[serde(default = "PersistenceSettings::default_interval_ms")]
    pub interval_ms: u64,
}

impl PersistenceSettings {
    fn default_interval_ms() -> u64 { 5_000 }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self { path: None, interval_ms: Self::default_interval_ms() }
    }
}

#[derive(Serialize, Deserialize)]
struct SnapNamespace { name: String, entries: Vec<(Vec<u8>, Vec<u8>)> }

#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, created_ms: i64, namespaces: Vec<SnapNamespace> }

/// In-memory namespaced backend with optional bincode snapshot persistence.
#[derive(Clone)]
pub struct MemoryBackend {
    map: Arc<parking_lot::RwLock<Namespaces>>,
    snapshot_path: Option<PathBuf>,
    /// Guard to ensure we only spawn one persistence thread
    persist_started: Arc<parking_lot::Mutex<bool>>,
}

impl Default for MemoryBackend {
    fn default() -> Self { Self::new() }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            map: Arc::new(parking_lot::RwLock::new(StdHashMap::new())),
            snapshot_path: None,
            persist_started: Arc::new(parking_lot::Mutex::new(false)),
        }
    }

    /// Open a backend bound to `path`, loading the snapshot there if one exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let mut s = Self::new();
        s.snapshot_path = Some(path.as_ref().to_path_buf());
        s.load_snapshot()?;
        Ok(s)
    }

    /// Build from persistence settings and start the background snapshot loop when a path is set.
    pub fn from_settings(settings: &PersistenceSettings) -> Result<Self, BackendError> {
        match &settings.path {
            Some(p) => {
                let s = Self::open(p)?;
                s.ensure_persistence_loop(Duration::from_millis(settings.interval_ms));
                Ok(s)
            }
            None => Ok(Self::new()),
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot_path.as_deref() }

    fn ensure_persistence_loop(&self, interval: Duration) {
        let mut started = self.persist_started.lock();
        if *started { return; }
        *started = true;
        drop(started);
        let this = self.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            if let Err(e) = this.save_snapshot() {
                warn!(target: "storage", "background snapshot failed: {e}");
            }
        });
    }

    /// Write every namespace to the snapshot file. Temp file then rename so a crash
    /// never leaves a half-written snapshot behind. No-op without a snapshot path.
    pub fn save_snapshot(&self) -> Result<(), BackendError> {
        let Some(path) = self.snapshot_path.as_ref() else { return Ok(()); };
        let created_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
        let mut namespaces: Vec<SnapNamespace> = self
            .map
            .read()
            .iter()
            .map(|(name, m)| SnapNamespace {
                name: name.clone(),
                entries: m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            })
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        let snap = Snapshot { version: SNAPSHOT_VERSION, created_ms, namespaces };
        let bytes = bincode::serialize(&snap).map_err(|e| BackendError::Corrupt(e.to_string()))?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() { std::fs::create_dir_all(dir)?; }
        }
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        debug!(target: "storage", "snapshot written to {}", path.display());
        Ok(())
    }

    /// Replace in-memory contents with the snapshot on disk, if one exists.
    pub fn load_snapshot(&self) -> Result<(), BackendError> {
        let Some(path) = self.snapshot_path.as_ref() else { return Ok(()); };
        if !path.exists() { return Ok(()); }
        let bytes = std::fs::read(path)?;
        let snap: Snapshot = bincode::deserialize(&bytes).map_err(|e| BackendError::Corrupt(e.to_string()))?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(BackendError::Corrupt(format!("unsupported snapshot version {}", snap.version)));
        }
        let mut w = self.map.write();
        w.clear();
        for ns in snap.namespaces {
            w.insert(ns.name, ns.entries.into_iter().collect());
        }
        info!(target: "storage", "loaded snapshot {} ({} namespaces)", path.display(), w.len());
        Ok(())
    }

    /// Return the names of all namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut out: Vec<String> = self.map.read().keys().cloned().collect();
        out.sort();
        out
    }

    /// Number of keys in a namespace, zero if it does not exist.
    pub fn len(&self, namespace: &str) -> usize {
        self.map.read().get(namespace).map(|m| m.len()).unwrap_or(0)
    }
}

fn missing(namespace: &str) -> BackendError { BackendError::NamespaceNotFound(namespace.to_string()) }

impl KvBackend for MemoryBackend {
    fn create_namespace(&self, name: &str) -> Result<(), BackendError> {
        self.map.write().entry(name.to_string()).or_default();
        Ok(())
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> Result<(), BackendError> {
        let mut w = self.map.write();
        let ns = w.get_mut(namespace).ok_or_else(|| missing(namespace))?;
        ns.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        let r = self.map.read();
        let ns = r.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(ns.get(key).cloned())
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> Result<(), BackendError> {
        let mut w = self.map.write();
        let ns = w.get_mut(namespace).ok_or_else(|| missing(namespace))?;
        ns.remove(key);
        Ok(())
    }

    fn keys(&self, namespace: &str) -> Result<Vec<Vec<u8>>, BackendError> {
        let r = self.map.read();
        let ns = r.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(ns.keys().cloned().collect())
    }
}
