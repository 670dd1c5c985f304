//! fitgate core library.
//!
//! Provider client, session lifecycle and error normalization for the
//! fitgate HTTP facade. The server crate builds its routes on top of
//! [`auth::SessionManager`] and [`envelope::ErrorEnvelope`].

pub mod api;
pub mod auth;
pub mod config;
pub mod envelope;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{ConnectClient, ProviderClient, ProviderError};
pub use auth::{Credentials, SessionError, SessionManager, SessionState};
pub use config::Config;
pub use envelope::{ErrorEnvelope, ErrorKind};
