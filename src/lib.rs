pub mod config;
pub mod credential;
pub mod error;
pub mod identity;
pub mod objects;
pub mod server;
pub mod service;
pub mod storage;
mod sync;

pub use config::Config;
pub use credential::{Key, Salt, SaltedHash};
pub use error::{AuthError, AuthResult, BackendError};
pub use identity::{Account, AdminStore, IdentityStore, Session, SessionConfig, SessionManager};
pub use objects::{ObjectStore, Permissions, StoredObject};
pub use service::{DeleteAuth, Service};
pub use storage::{KvBackend, MemoryBackend, SharedBackend};

/// Shorten a token or key for log output so full credentials never reach the logs.
pub(crate) fn short(secret: &str) -> &str {
    secret.get(..8).unwrap_or("<short>")
}
