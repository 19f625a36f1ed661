use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::account::IdentityStore;
use crate::credential::{self, Key};
use crate::error::{AuthError, AuthResult};
use crate::storage::{get_json, put_json, SharedBackend};
use crate::sync::LockStripe;

/// Default sliding window: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Idle window; each successful validation pushes expiry to `now + timeout`.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self { Self { timeout: DEFAULT_TIMEOUT } }
}

impl SessionConfig {
    pub fn with_timeout(timeout: Duration) -> Self { Self { timeout } }
}

/// One active session per email. A new login overwrites the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub key: Key,
    pub expires_at: DateTime<Utc>,
}

fn expiry_from(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Issues, validates, slides and revokes session tokens.
///
/// Every operation on a given email runs under that email's stripe lock, so a
/// validation can never write its slid expiry back after a concurrent logout.
pub struct SessionManager {
    backend: SharedBackend,
    identities: IdentityStore,
    timeout: RwLock<Duration>,
    stripe: LockStripe,
}

impl SessionManager {
    pub const LOGIN_KEYS: &'static str = "user-login-keys";

    pub fn new(backend: SharedBackend, identities: IdentityStore, config: SessionConfig) -> Self {
        Self { backend, identities, timeout: RwLock::new(config.timeout), stripe: LockStripe::default() }
    }

    pub fn setup(&self) -> AuthResult<()> {
        self.backend.create_namespace(Self::LOGIN_KEYS)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration { *self.timeout.read() }

    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write() = timeout;
        info!(target: "session", "session timeout set to {:?}", timeout);
    }

    fn load(&self, email: &str) -> AuthResult<Option<Session>> {
        get_json(self.backend.as_ref(), Self::LOGIN_KEYS, email)
    }

    fn store(&self, session: &Session) -> AuthResult<()> {
        put_json(self.backend.as_ref(), Self::LOGIN_KEYS, &session.email, session)
    }

    /// Current stored session for `email`, without validating or sliding it.
    pub fn get(&self, email: &str) -> AuthResult<Option<Session>> {
        self.load(email)
    }

    /// Hold the per-email lock every session operation takes. Callers that need a
    /// compound step to be atomic with login, validate and logout take it here and
    /// use the `*_locked` variants.
    pub(crate) fn lock(&self, email: &str) -> MutexGuard<'_, ()> {
        self.stripe.lock(email)
    }

    pub fn login(&self, email: &str, password: &str) -> AuthResult<Key> {
        let _g = self.stripe.lock(email);
        self.identities.check_password(email, password)?;
        let now = Utc::now();
        let key = credential::issue_token(password, &credential::time_seed());
        let session = Session { email: email.to_string(), key: key.clone(), expires_at: expiry_from(now, self.timeout()) };
        self.store(&session)?;
        info!(target: "session", "user {email:?} logged in, key {}", crate::short(key.as_str()));
        Ok(key)
    }

    pub fn validate(&self, email: &str, key: &str) -> AuthResult<()> {
        let _g = self.stripe.lock(email);
        self.validate_locked(email, key)
    }

    /// [`validate`](Self::validate) for a caller already holding [`lock`](Self::lock).
    pub(crate) fn validate_locked(&self, email: &str, key: &str) -> AuthResult<()> {
        let Some(mut session) = self.load(email)? else {
            return Err(AuthError::NotLoggedIn(email.to_string()));
        };
        if session.key != *key {
            debug!(target: "session", "bad key {} for {email:?}", crate::short(key));
            return Err(AuthError::BadToken(email.to_string()));
        }
        let now = Utc::now();
        if now >= session.expires_at {
            // Left in place: the caller must log out or log in again.
            debug!(target: "session", "session for {email:?} expired at {}", session.expires_at);
            return Err(AuthError::TimedOut(email.to_string()));
        }
        session.expires_at = expiry_from(now, self.timeout());
        self.store(&session)
    }

    pub fn logout(&self, email: &str, key: &str) -> AuthResult<()> {
        let _g = self.stripe.lock(email);
        self.validate_locked(email, key)?;
        self.backend.delete(Self::LOGIN_KEYS, email.as_bytes())?;
        info!(target: "session", "user {email:?} logged out");
        Ok(())
    }

    /// Drop any session for `email` without validating it. Returns whether one existed.
    pub fn clear(&self, email: &str) -> AuthResult<bool> {
        let _g = self.stripe.lock(email);
        self.clear_locked(email)
    }

    pub(crate) fn clear_locked(&self, email: &str) -> AuthResult<bool> {
        let existed = self.load(email)?.is_some();
        if existed {
            self.backend.delete(Self::LOGIN_KEYS, email.as_bytes())?;
            debug!(target: "session", "session for {email:?} cleared");
        }
        Ok(existed)
    }
}
