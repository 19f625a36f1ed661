use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credential::{self, Key, Salt, SaltedHash};
use crate::error::{AuthError, AuthResult};
use crate::storage::{get_json, put_json, SharedBackend};
use crate::sync::LockStripe;

/// Persisted account record, keyed by email within one identity namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub salt: Salt,
    pub hash: SaltedHash,
    /// API key, only set on admin accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
}

/// CRUD over account records in a single namespace. The user and admin identity
/// spaces are two instances of this type that differ only in namespace.
#[derive(Clone)]
pub struct IdentityStore {
    backend: SharedBackend,
    namespace: &'static str,
    stripe: Arc<LockStripe>,
}

impl IdentityStore {
    pub const USERS: &'static str = "user-users";
    pub const ADMINS: &'static str = "admin-admins";

    pub fn new(backend: SharedBackend, namespace: &'static str) -> Self {
        Self { backend, namespace, stripe: Arc::new(LockStripe::default()) }
    }

    pub fn users(backend: SharedBackend) -> Self { Self::new(backend, Self::USERS) }

    pub fn admins(backend: SharedBackend) -> Self { Self::new(backend, Self::ADMINS) }

    pub fn namespace(&self) -> &'static str { self.namespace }

    /// Create the backing namespace.
    pub fn setup(&self) -> AuthResult<()> {
        self.backend.create_namespace(self.namespace)?;
        Ok(())
    }

    fn load(&self, email: &str) -> AuthResult<Option<Account>> {
        get_json(self.backend.as_ref(), self.namespace, email)
    }

    /// Register `email`, salting with the current time. Fails with `AlreadyExists`.
    pub fn create(&self, email: &str, password: &str) -> AuthResult<Account> {
        self.create_seeded(email, password, &credential::time_seed())
    }

    pub fn create_seeded(&self, email: &str, password: &str, seed: &str) -> AuthResult<Account> {
        let (hash, salt) = credential::hashed_and_salt(password, seed);
        let account = Account { email: email.to_string(), salt, hash, key: None };
        self.insert(&account)?;
        Ok(account)
    }

    /// Store a fully built record. Fails with `AlreadyExists` if the email is taken.
    pub fn insert(&self, account: &Account) -> AuthResult<()> {
        let email = account.email.as_str();
        let _g = self.stripe.lock(email);
        if self.load(email)?.is_some() {
            return Err(AuthError::AlreadyExists(format!("account for email {email:?}")));
        }
        put_json(self.backend.as_ref(), self.namespace, email, account)?;
        info!(target: "identity", "{}: account {email:?} created", self.namespace);
        Ok(())
    }

    pub fn get(&self, email: &str) -> AuthResult<Account> {
        self.load(email)?
            .ok_or_else(|| AuthError::NotFound(format!("account for email {email:?}")))
    }

    pub fn exists(&self, email: &str) -> AuthResult<bool> {
        Ok(self.load(email)?.is_some())
    }

    /// Full replacement of an existing record.
    pub fn replace(&self, account: &Account) -> AuthResult<()> {
        let _g = self.stripe.lock(&account.email);
        if self.load(&account.email)?.is_none() {
            return Err(AuthError::NotFound(format!("account for email {:?}", account.email)));
        }
        put_json(self.backend.as_ref(), self.namespace, &account.email, account)
    }

    pub fn delete(&self, email: &str) -> AuthResult<()> {
        let _g = self.stripe.lock(email);
        if self.load(email)?.is_none() {
            return Err(AuthError::NotFound(format!("account for email {email:?}")));
        }
        self.backend.delete(self.namespace, email.as_bytes())?;
        info!(target: "identity", "{}: account {email:?} deleted", self.namespace);
        Ok(())
    }

    pub fn check_password(&self, email: &str, password: &str) -> AuthResult<()> {
        let account = self.get(email)?;
        if !credential::verify(password, &account.salt, &account.hash) {
            debug!(target: "identity", "{}: password mismatch for {email:?}", self.namespace);
            return Err(AuthError::InvalidCredential(email.to_string()));
        }
        Ok(())
    }
}
