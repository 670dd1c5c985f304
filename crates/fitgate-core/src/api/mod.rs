//! Provider client module.
//!
//! `ProviderClient` is the seam the session manager and handlers talk to.
//! `ConnectClient` implements it against the Garmin Connect web services:
//! SSO sign-in, OAuth1/OAuth2 token handling and the read-only data calls.

pub mod client;
pub mod error;
pub mod oauth;
pub mod provider;
mod sso;
pub mod tokens;

pub use client::{ConnectClient, ConnectSession};
pub use error::{ProviderError, ProviderResult};
pub use provider::ProviderClient;
