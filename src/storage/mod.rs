//!
//! keygate storage module
//! ----------------------
//! The credential, session and object layers never touch persisted bytes directly.
//! They go through the [`KvBackend`] contract: named namespaces holding opaque
//! byte values, with four primitive operations (create-namespace, put, get, delete)
//! plus a key scan used by bulk owner deletion.
//!
//! Records are stored as JSON through [`put_json`] / [`get_json`]. Values handed back
//! to callers are owned copies; nothing aliases backend-internal state.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AuthResult, BackendError};

pub mod kv;

pub use kv::{MemoryBackend, PersistenceSettings};

/// Namespaced, individually-atomic key/value store.
pub trait KvBackend: Send + Sync {
    /// Create a namespace if it does not already exist.
    fn create_namespace(&self, name: &str) -> Result<(), BackendError>;
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> Result<(), BackendError>;
    /// `Ok(None)` when the key is absent.
    fn get(&self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError>;
    /// Deleting an absent key is not an error.
    fn delete(&self, namespace: &str, key: &[u8]) -> Result<(), BackendError>;
    /// Snapshot of every key currently in the namespace.
    fn keys(&self, namespace: &str) -> Result<Vec<Vec<u8>>, BackendError>;
}

pub type SharedBackend = Arc<dyn KvBackend>;

/// Create every namespace in `names`.
pub fn setup_namespaces(backend: &dyn KvBackend, names: &[&str]) -> Result<(), BackendError> {
    for name in names {
        backend.create_namespace(name)?;
    }
    Ok(())
}

/// Serialize `value` as JSON and store it under `key`.
pub fn put_json<T: Serialize>(backend: &dyn KvBackend, namespace: &str, key: &str, value: &T) -> AuthResult<()> {
    let bytes = serde_json::to_vec(value)?;
    backend.put(namespace, key.as_bytes(), &bytes)?;
    Ok(())
}

/// Fetch and decode the JSON record under `key`. Empty values count as absent.
pub fn get_json<T: DeserializeOwned>(backend: &dyn KvBackend, namespace: &str, key: &str) -> AuthResult<Option<T>> {
    match backend.get(namespace, key.as_bytes())? {
        Some(bytes) if !bytes.is_empty() => Ok(Some(serde_json::from_slice(&bytes)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec { name: String, n: u32 }

    #[test]
    fn json_records_round_trip_through_backend() {
        let b = MemoryBackend::new();
        setup_namespaces(&b, &["recs"]).unwrap();
        let r = Rec { name: "a".into(), n: 3 };
        put_json(&b, "recs", "k", &r).unwrap();
        let back: Option<Rec> = get_json(&b, "recs", "k").unwrap();
        assert_eq!(back, Some(r));
        let missing: Option<Rec> = get_json(&b, "recs", "nope").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn empty_value_reads_as_absent() {
        let b = MemoryBackend::new();
        b.create_namespace("recs").unwrap();
        b.put("recs", b"k", b"").unwrap();
        let got: Option<Rec> = get_json(&b, "recs", "k").unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn garbage_record_is_a_codec_error() {
        let b = MemoryBackend::new();
        b.create_namespace("recs").unwrap();
        b.put("recs", b"k", b"{not json").unwrap();
        let err = get_json::<Rec>(&b, "recs", "k").unwrap_err();
        assert_eq!(err.code_str(), "codec_error");
    }
}
