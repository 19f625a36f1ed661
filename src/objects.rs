//! Owner-authorized object store.
//!
//! Each stored object carries a single-owner permission record fixed at creation.
//! Every read, write and delete checks the caller against that owner before the
//! backend is touched. There are no shares, groups or read-only grants: the owner
//! has full rights and everyone else has none.

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};
use crate::storage::{get_json, put_json, SharedBackend};
use crate::sync::LockStripe;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub owner: String,
}

impl Permissions {
    pub fn owned_by(owner: impl Into<String>) -> Self { Self { owner: owner.into() } }

    pub fn authorized(&self, email: &str) -> AuthResult<()> {
        if self.owner != email {
            return Err(AuthError::Unauthorized(email.to_string()));
        }
        Ok(())
    }
}

mod payload_b64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: String,
    #[serde(with = "payload_b64")]
    pub payload: Vec<u8>,
    pub perms: Permissions,
}

impl StoredObject {
    pub fn owner(&self) -> &str { &self.perms.owner }

    /// Payload as UTF-8 text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> { std::str::from_utf8(&self.payload).ok() }

    /// Base64 rendering of the payload, for transports that cannot carry raw bytes.
    pub fn payload_b64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.payload)
    }
}

#[derive(Clone)]
pub struct ObjectStore {
    backend: SharedBackend,
    stripe: Arc<LockStripe>,
}

impl ObjectStore {
    pub const OBJECTS: &'static str = "object-objects";

    pub fn new(backend: SharedBackend) -> Self {
        Self { backend, stripe: Arc::new(LockStripe::default()) }
    }

    pub fn setup(&self) -> AuthResult<()> {
        self.backend.create_namespace(Self::OBJECTS)?;
        Ok(())
    }

    fn load(&self, id: &str) -> AuthResult<Option<StoredObject>> {
        get_json(self.backend.as_ref(), Self::OBJECTS, id)
    }

    /// Store `payload` at `id`. An existing object may only be replaced by its owner,
    /// and the owner recorded at creation is kept.
    pub fn put(&self, id: &str, payload: Vec<u8>, owner: &str) -> AuthResult<StoredObject> {
        let _g = self.stripe.lock(id);
        let perms = match self.load(id)? {
            Some(existing) => {
                existing.perms.authorized(owner)?;
                existing.perms
            }
            None => Permissions::owned_by(owner),
        };
        let obj = StoredObject { id: id.to_string(), payload, perms };
        put_json(self.backend.as_ref(), Self::OBJECTS, id, &obj)?;
        info!(target: "objects", "object {id:?} stored for {owner:?} ({} bytes)", obj.payload.len());
        Ok(obj)
    }

    pub fn get(&self, id: &str, caller: &str) -> AuthResult<Vec<u8>> {
        Ok(self.get_object(id, caller)?.payload)
    }

    /// Full record, including its permissions.
    pub fn get_object(&self, id: &str, caller: &str) -> AuthResult<StoredObject> {
        let obj = self.load(id)?.ok_or_else(|| AuthError::NotFound(format!("object {id:?}")))?;
        obj.perms.authorized(caller)?;
        Ok(obj)
    }

    /// Deleting an absent object succeeds.
    pub fn delete(&self, id: &str, caller: &str) -> AuthResult<()> {
        let _g = self.stripe.lock(id);
        let Some(obj) = self.load(id)? else {
            debug!(target: "objects", "delete of absent object {id:?}");
            return Ok(());
        };
        obj.perms.authorized(caller)?;
        self.backend.delete(Self::OBJECTS, id.as_bytes())?;
        info!(target: "objects", "object {id:?} deleted by {caller:?}");
        Ok(())
    }

    /// Delete every object owned by `owner`. Returns how many were removed.
    pub fn delete_all(&self, owner: &str) -> AuthResult<usize> {
        let mut removed = 0usize;
        for raw in self.backend.keys(Self::OBJECTS)? {
            let Ok(id) = String::from_utf8(raw) else { continue };
            let _g = self.stripe.lock(&id);
            match self.load(&id)? {
                Some(obj) if obj.owner() == owner => {
                    self.backend.delete(Self::OBJECTS, id.as_bytes())?;
                    removed += 1;
                }
                _ => {}
            }
        }
        info!(target: "objects", "deleted {removed} objects owned by {owner:?}");
        Ok(removed)
    }
}
