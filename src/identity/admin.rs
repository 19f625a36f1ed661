use tracing::{info, warn};

use super::account::{Account, IdentityStore};
use crate::credential::{self, Key};
use crate::error::{AuthError, AuthResult};
use crate::storage::SharedBackend;

/// Admin identity space: an [`IdentityStore`] over the admin namespace plus an
/// index from API key to email. Admin-ness is existence of a record here.
#[derive(Clone)]
pub struct AdminStore {
    backend: SharedBackend,
    accounts: IdentityStore,
}

impl AdminStore {
    pub const KEYS: &'static str = "admin-keys";

    pub fn new(backend: SharedBackend) -> Self {
        Self { accounts: IdentityStore::admins(backend.clone()), backend }
    }

    pub fn namespaces(&self) -> [&'static str; 2] { [self.accounts.namespace(), Self::KEYS] }

    pub fn setup(&self) -> AuthResult<()> {
        self.accounts.setup()?;
        self.backend.create_namespace(Self::KEYS)?;
        Ok(())
    }

    pub fn accounts(&self) -> &IdentityStore { &self.accounts }

    /// Create an admin and mint its API key from the salted hash and the current time.
    /// The account is written once, already carrying its key.
    pub fn create(&self, email: &str, password: &str) -> AuthResult<Key> {
        let (hash, salt) = credential::hashed_and_salt(password, &credential::time_seed());
        let key = credential::issue_token(hash.as_str(), &credential::time_seed());
        let account = Account { email: email.to_string(), salt, hash, key: Some(key.clone()) };
        self.accounts.insert(&account)?;
        if let Err(e) = self.backend.put(Self::KEYS, key.as_str().as_bytes(), email.as_bytes()) {
            warn!(target: "identity", "admin {email:?} key index write failed, rolling back: {e}");
            self.accounts.delete(email)?;
            return Err(e.into());
        }
        info!(target: "identity", "admin {email:?} created with key {}", crate::short(key.as_str()));
        Ok(key)
    }

    /// The admin owning `key`, or `NotFound`.
    pub fn is_admin(&self, key: &str) -> AuthResult<Account> {
        let not_found = || AuthError::NotFound(format!("admin for key {}", crate::short(key)));
        if key.is_empty() {
            return Err(not_found());
        }
        let email = self.backend.get(Self::KEYS, key.as_bytes())?.ok_or_else(not_found)?;
        let email = String::from_utf8(email).map_err(|_| not_found())?;
        let account = self.accounts.get(&email).map_err(|e| match e {
            AuthError::NotFound(_) => not_found(),
            other => other,
        })?;
        // Index entries left behind by a replaced key do not grant access.
        if account.key.as_ref().map(|k| k == key) != Some(true) {
            return Err(not_found());
        }
        Ok(account)
    }

    pub fn is_admin_email(&self, email: &str) -> AuthResult<Account> {
        self.accounts
            .get(email)
            .map_err(|e| match e {
                AuthError::NotFound(_) => AuthError::NotFound(format!("admin for email {email:?}")),
                other => other,
            })
    }

    pub fn delete(&self, key: &str) -> AuthResult<()> {
        let account = self.is_admin(key)?;
        self.accounts.delete(&account.email)?;
        self.backend.delete(Self::KEYS, key.as_bytes())?;
        info!(target: "identity", "admin {:?} deleted", account.email);
        Ok(())
    }

    pub fn delete_by_email(&self, email: &str) -> AuthResult<()> {
        let account = self.is_admin_email(email)?;
        if let Some(key) = &account.key {
            self.backend.delete(Self::KEYS, key.as_str().as_bytes())?;
        }
        self.accounts.delete(email)?;
        info!(target: "identity", "admin {email:?} deleted");
        Ok(())
    }
}
