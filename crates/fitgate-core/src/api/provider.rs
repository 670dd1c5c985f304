//! The seam between the session manager and a concrete fitness provider.

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::auth::Credentials;

use super::ProviderResult;

/// A remote fitness provider as seen by the session manager and handlers.
///
/// Implementations own their token-blob format and wire protocol. Records are
/// returned as raw JSON so handlers can pass them through untouched.
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    /// Authenticated session handle. Shared between concurrent requests.
    type Session: Send + Sync + 'static;

    /// Restore a session from the token blob at `token_store`.
    async fn resume(&self, token_store: &Path) -> ProviderResult<Self::Session>;

    /// Authenticate from scratch with an email/password pair.
    async fn login(&self, credentials: &Credentials) -> ProviderResult<Self::Session>;

    /// Persist the session's tokens to `token_store`, replacing what is there.
    async fn dump_tokens(&self, session: &Self::Session, token_store: &Path) -> ProviderResult<()>;

    async fn full_name(&self, session: &Self::Session) -> ProviderResult<Option<String>>;

    async fn device_last_used(&self, session: &Self::Session) -> ProviderResult<Value>;

    /// Daily activity summary (steps, distance, calories, ...).
    async fn user_summary(&self, session: &Self::Session, date: NaiveDate) -> ProviderResult<Value>;

    async fn heart_rates(&self, session: &Self::Session, date: NaiveDate) -> ProviderResult<Value>;

    /// Most recent activities, newest first.
    async fn activities(
        &self,
        session: &Self::Session,
        start: u32,
        limit: u32,
    ) -> ProviderResult<Vec<Value>>;

    async fn hydration(&self, session: &Self::Session, date: NaiveDate) -> ProviderResult<Value>;

    async fn sleep(&self, session: &Self::Session, date: NaiveDate) -> ProviderResult<Value>;

    async fn stress(&self, session: &Self::Session, date: NaiveDate) -> ProviderResult<Value>;

    async fn body_composition(
        &self,
        session: &Self::Session,
        date: NaiveDate,
    ) -> ProviderResult<Value>;
}
