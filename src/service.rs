//! Composition root for the request-facing operations.
//!
//! `Service` wires the identity spaces, the session manager and the object store over
//! one backend. It is the "calling layer": object operations run a fresh session
//! validation before the ownership check, user management is gated by an admin key
//! (or the user's own password for self-deletion), and deleting an account cascades
//! to the account's objects and session.

use tracing::{info, warn};

use crate::credential::Key;
use crate::error::{AuthError, AuthResult};
use crate::identity::{Account, AdminStore, IdentityStore, SessionConfig, SessionManager};
use crate::objects::{ObjectStore, StoredObject};
use crate::storage::{setup_namespaces, SharedBackend};

/// Proof offered when deleting a user account.
#[derive(Debug, Clone, Copy)]
pub enum DeleteAuth<'a> {
    /// Any admin may delete any user.
    AdminKey(&'a str),
    /// The user deleting their own account.
    Password(&'a str),
}

pub struct Service {
    backend: SharedBackend,
    users: IdentityStore,
    admins: AdminStore,
    sessions: SessionManager,
    objects: ObjectStore,
}

impl Service {
    /// Build the service and create every namespace it uses.
    pub fn new(backend: SharedBackend, config: SessionConfig) -> AuthResult<Self> {
        let users = IdentityStore::users(backend.clone());
        let admins = AdminStore::new(backend.clone());
        let sessions = SessionManager::new(backend.clone(), users.clone(), config);
        let objects = ObjectStore::new(backend.clone());
        let svc = Self { backend, users, admins, sessions, objects };
        setup_namespaces(svc.backend.as_ref(), &svc.namespaces())?;
        Ok(svc)
    }

    pub fn namespaces(&self) -> Vec<&'static str> {
        let mut out = vec![IdentityStore::USERS, SessionManager::LOGIN_KEYS, ObjectStore::OBJECTS];
        out.extend(self.admins.namespaces());
        out
    }

    pub fn backend(&self) -> &SharedBackend { &self.backend }
    pub fn users(&self) -> &IdentityStore { &self.users }
    pub fn admins(&self) -> &AdminStore { &self.admins }
    pub fn sessions(&self) -> &SessionManager { &self.sessions }
    pub fn objects(&self) -> &ObjectStore { &self.objects }

    /// Create the bootstrap admin unless an admin with that email already exists.
    /// Returns the new key when one was created.
    pub fn bootstrap_admin(&self, email: &str, password: &str) -> AuthResult<Option<Key>> {
        match self.admins.is_admin_email(email) {
            Ok(_) => Ok(None),
            Err(AuthError::NotFound(_)) => {
                let key = self.admins.create(email, password)?;
                info!(target: "service", "bootstrap admin {email:?} created");
                Ok(Some(key))
            }
            Err(e) => Err(e),
        }
    }

    // --- admins ---------------------------------------------------------------

    pub fn check_admin(&self, key: &str) -> AuthResult<Account> {
        self.admins.is_admin(key)
    }

    pub fn create_admin(&self, admin_key: &str, email: &str, password: &str) -> AuthResult<Key> {
        require_field("email", email)?;
        self.admins.is_admin(admin_key)?;
        self.admins.create(email, password)
    }

    /// Delete the admin owning `admin_key`.
    pub fn delete_admin(&self, admin_key: &str) -> AuthResult<()> {
        self.admins.delete(admin_key)
    }

    // --- users ----------------------------------------------------------------

    pub fn create_user(&self, admin_key: &str, email: &str, password: &str) -> AuthResult<()> {
        require_field("email", email)?;
        self.admins.is_admin(admin_key)?;
        self.users.create(email, password)?;
        Ok(())
    }

    /// Delete a user account, its objects and its session.
    ///
    /// Runs under the email's session lock, which login and every object operation
    /// also hold, so no login or object write for `email` interleaves with the cascade.
    pub fn delete_user(&self, auth: DeleteAuth<'_>, email: &str) -> AuthResult<()> {
        require_field("email", email)?;
        let _g = self.sessions.lock(email);
        match auth {
            DeleteAuth::AdminKey(key) => {
                self.admins.is_admin(key)?;
            }
            DeleteAuth::Password(pw) => self.users.check_password(email, pw)?,
        }
        self.users.delete(email)?;
        if self.sessions.clear_locked(email)? {
            info!(target: "service", "logged out deleted user {email:?}");
        }
        let removed = self.objects.delete_all(email)?;
        info!(target: "service", "user {email:?} deleted with {removed} objects");
        Ok(())
    }

    pub fn login(&self, email: &str, password: &str) -> AuthResult<Key> {
        require_field("email", email)?;
        self.sessions.login(email, password)
    }

    pub fn validate(&self, email: &str, key: &str) -> AuthResult<()> {
        self.sessions.validate(email, key)
    }

    pub fn logout(&self, email: &str, key: &str) -> AuthResult<()> {
        self.sessions.logout(email, key)
    }

    // --- objects --------------------------------------------------------------

    /// Validate the session and run `op` while still holding the email's session lock.
    fn gated<T>(&self, email: &str, key: &str, op: impl FnOnce() -> AuthResult<T>) -> AuthResult<T> {
        let _g = self.sessions.lock(email);
        self.sessions.validate_locked(email, key).inspect_err(|e| {
            warn!(target: "service", "session check failed for {email:?}: {e}");
        })?;
        op()
    }

    pub fn put_object(&self, email: &str, key: &str, id: &str, payload: Vec<u8>) -> AuthResult<StoredObject> {
        require_field("id", id)?;
        self.gated(email, key, || self.objects.put(id, payload, email))
    }

    pub fn get_object(&self, email: &str, key: &str, id: &str) -> AuthResult<StoredObject> {
        self.gated(email, key, || self.objects.get_object(id, email))
    }

    pub fn delete_object(&self, email: &str, key: &str, id: &str) -> AuthResult<()> {
        self.gated(email, key, || self.objects.delete(id, email))
    }
}

fn require_field(name: &str, value: &str) -> AuthResult<()> {
    if value.is_empty() {
        return Err(AuthError::BadRequest(format!("missing {name}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use std::sync::Arc;

    #[test]
    fn new_creates_all_namespaces() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = Service::new(backend.clone(), SessionConfig::default()).unwrap();
        let mut expected: Vec<String> = svc.namespaces().into_iter().map(String::from).collect();
        expected.sort();
        assert_eq!(backend.namespaces(), expected);
    }

    #[test]
    fn bootstrap_admin_is_idempotent() {
        let svc = Service::new(Arc::new(MemoryBackend::new()), SessionConfig::default()).unwrap();
        let key = svc.bootstrap_admin("root@x.com", "pw").unwrap();
        assert!(key.is_some());
        assert!(svc.bootstrap_admin("root@x.com", "pw").unwrap().is_none());
        svc.check_admin(key.unwrap().as_str()).unwrap();
    }

    #[test]
    fn empty_email_is_bad_request() {
        let svc = Service::new(Arc::new(MemoryBackend::new()), SessionConfig::default()).unwrap();
        assert!(matches!(svc.login("", "pw"), Err(AuthError::BadRequest(_))));
    }
}
