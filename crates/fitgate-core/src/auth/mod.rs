//! Authentication module.
//!
//! Credential handling, the persisted token store and the process-wide
//! session manager.

pub mod credentials;
pub mod session;
pub mod token_store;

pub use credentials::Credentials;
pub use session::{LoginOutcome, SessionError, SessionManager, SessionState};
