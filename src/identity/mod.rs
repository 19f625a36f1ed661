//! Account, admin and session management for keygate.
//! Keep the public surface thin and split implementation across sub-modules.

mod account;
mod admin;
mod session;

pub use account::{Account, IdentityStore};
pub use admin::AdminStore;
pub use session::{Session, SessionConfig, SessionManager, DEFAULT_TIMEOUT};
