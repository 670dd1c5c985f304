//! Process-wide session lifecycle.
//!
//! One `SessionManager` owns the single provider session. Handlers never touch
//! the session directly; they go through [`SessionManager::acquire`],
//! [`SessionManager::login`] or [`SessionManager::with_session`].
//!
//! State machine:
//!
//! ```text
//! Uninitialized --acquire--> Authenticating --ok--> Ready
//!        ^                         |                  |
//!        |                       error          provider rejects
//!        |                         v                  v
//!        +------ (next acquire) Invalid <-------------+
//! ```
//!
//! `login` moves any state straight to `Ready` without reading the token store.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ProviderClient, ProviderError, ProviderResult};
use crate::envelope::{self, ErrorEnvelope, ErrorKind};

use super::Credentials;

/// Why a session could not be established.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No saved session at {}; log in with credentials first", path.display())]
    TokenStoreMissing { path: PathBuf },

    #[error("Token store at {} is unreadable: {message}", path.display())]
    TokenStoreUnreadable { path: PathBuf, message: String },

    #[error("Authentication failed: {0}")]
    Rejected(String),

    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    #[error("Logged in, but tokens could not be saved: {0}")]
    PersistFailed(String),

    #[error("{0}")]
    Other(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::TokenStoreMissing { .. }
            | SessionError::TokenStoreUnreadable { .. }
            | SessionError::Rejected(_) => ErrorKind::AuthenticationFailure,
            SessionError::Unreachable(_) => ErrorKind::ConnectionFailure,
            SessionError::PersistFailed(_) | SessionError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Authentication(msg) => SessionError::Rejected(msg),
            ProviderError::Connection(msg) => SessionError::Unreachable(msg),
            ProviderError::Other(msg) => SessionError::Other(msg),
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Authenticating,
    Ready,
    Invalid,
}

/// Result of a successful credential login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Where the new session's tokens were written
    pub token_path: PathBuf,
}

type Attempt<S> = Shared<BoxFuture<'static, Result<Arc<S>, SessionError>>>;

enum Slot<S> {
    Uninitialized,
    /// A token-store resume in flight. Every caller that arrives meanwhile
    /// awaits the same attempt.
    Authenticating { generation: u64, attempt: Attempt<S> },
    Ready { session: Arc<S> },
    Invalid,
}

impl<S> Slot<S> {
    fn state(&self) -> SessionState {
        match self {
            Slot::Uninitialized => SessionState::Uninitialized,
            Slot::Authenticating { .. } => SessionState::Authenticating,
            Slot::Ready { .. } => SessionState::Ready,
            Slot::Invalid => SessionState::Invalid,
        }
    }
}

pub struct SessionManager<P: ProviderClient> {
    provider: Arc<P>,
    token_store: PathBuf,
    slot: Arc<Mutex<Slot<P::Session>>>,
    /// Held for the duration of every authentication call to the provider,
    /// resume or credential login, so at most one is in flight.
    auth_gate: Arc<Mutex<()>>,
    next_generation: AtomicU64,
}

impl<P: ProviderClient> SessionManager<P> {
    pub fn new(provider: P, token_store: impl Into<PathBuf>) -> Self {
        Self {
            provider: Arc::new(provider),
            token_store: token_store.into(),
            slot: Arc::new(Mutex::new(Slot::Uninitialized)),
            auth_gate: Arc::new(Mutex::new(())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn token_store(&self) -> &Path {
        &self.token_store
    }

    pub async fn state(&self) -> SessionState {
        self.slot.lock().await.state()
    }

    /// Return the ready session, resuming from the token store if needed.
    ///
    /// Makes no provider call when a session is already `Ready`. Otherwise a
    /// single resume attempt is made and shared by all concurrent callers;
    /// failures are returned as-is and never retried here.
    pub async fn acquire(&self) -> Result<Arc<P::Session>, SessionError> {
        let attempt = {
            let mut slot = self.slot.lock().await;
            match &*slot {
                Slot::Ready { session } => return Ok(Arc::clone(session)),
                Slot::Authenticating { attempt, .. } => attempt.clone(),
                Slot::Uninitialized | Slot::Invalid => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let attempt = self.spawn_resume(generation);
                    debug!(generation, "Resuming session from token store");
                    *slot = Slot::Authenticating {
                        generation,
                        attempt: attempt.clone(),
                    };
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Start resume attempt `generation` on its own task.
    ///
    /// The task settles the slot itself, so the attempt runs to completion and
    /// releases the auth gate even if every caller awaiting it goes away.
    fn spawn_resume(&self, generation: u64) -> Attempt<P::Session> {
        let provider = Arc::clone(&self.provider);
        let gate = Arc::clone(&self.auth_gate);
        let slot = Arc::clone(&self.slot);
        let path = self.token_store.clone();

        let task = tokio::spawn(async move {
            let _gate = gate.lock().await;

            // A credential login may have finished while we waited for the gate
            if let Slot::Ready { session } = &*slot.lock().await {
                debug!(generation, "Resume superseded by credential login");
                return Ok(Arc::clone(session));
            }

            let outcome = resume_from(provider.as_ref(), path).await;
            settle(&*slot, generation, &outcome).await;
            outcome
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(SessionError::Other(format!("Resume task failed: {}", e))))
        }
        .boxed()
        .shared()
    }

    /// Authenticate from scratch with `credentials`, regardless of state.
    ///
    /// On success the new session replaces the current one and its tokens
    /// overwrite the token store. On failure the current session, if any, is
    /// left untouched. The credentials are dropped before this returns.
    pub async fn login(&self, credentials: Credentials) -> Result<LoginOutcome, SessionError> {
        let _gate = self.auth_gate.lock().await;
        debug!("Logging in with credentials");

        let result = self.provider.login(&credentials).await;
        drop(credentials);

        let session = match result {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!(error = %e, "Credential login failed");
                return Err(e.into());
            }
        };

        *self.slot.lock().await = Slot::Ready {
            session: Arc::clone(&session),
        };
        info!("Session replaced by credential login");

        self.provider
            .dump_tokens(&session, &self.token_store)
            .await
            .map_err(|e| {
                warn!(error = %e, path = %self.token_store.display(), "Failed to persist tokens");
                SessionError::PersistFailed(e.to_string())
            })?;

        Ok(LoginOutcome {
            token_path: self.token_store.clone(),
        })
    }

    /// Mark `session` as rejected by the provider. Only takes effect while it
    /// is still the current session; returns whether the state changed.
    pub async fn invalidate(&self, session: &Arc<P::Session>) -> bool {
        let mut slot = self.slot.lock().await;
        let is_current = matches!(&*slot, Slot::Ready { session: current } if Arc::ptr_eq(current, session));
        if is_current {
            warn!("Provider rejected the session; it will be resumed on next use");
            *slot = Slot::Invalid;
        }
        is_current
    }

    /// Run one provider call against the ready session.
    ///
    /// Acquisition failures and call failures both come back as an
    /// [`ErrorEnvelope`]. Only an authentication rejection from the provider
    /// invalidates the session; other failures leave it in place.
    pub async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, ErrorEnvelope>
    where
        F: FnOnce(Arc<P>, Arc<P::Session>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let session = self.acquire().await.map_err(|e| {
            debug!(error = %e, "Session acquisition failed");
            ErrorEnvelope::from(e)
        })?;
        let outcome = envelope::guard(op(Arc::clone(&self.provider), Arc::clone(&session))).await;

        if let Err(ref e) = outcome {
            if e.kind == ErrorKind::AuthenticationFailure {
                self.invalidate(&session).await;
            }
        }
        outcome
    }
}

async fn resume_from<P: ProviderClient>(
    provider: &P,
    path: PathBuf,
) -> Result<Arc<P::Session>, SessionError> {
    match tokio::fs::metadata(&path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SessionError::TokenStoreMissing { path });
        }
        Err(e) => {
            return Err(SessionError::TokenStoreUnreadable {
                path,
                message: e.to_string(),
            });
        }
    }
    let session = provider.resume(&path).await?;
    Ok(Arc::new(session))
}

/// Record the outcome of resume attempt `generation`. A slot that has since
/// moved on (e.g. a credential login) is left alone.
async fn settle<S>(slot: &Mutex<Slot<S>>, generation: u64, outcome: &Result<Arc<S>, SessionError>) {
    let mut slot = slot.lock().await;
    let current = match &*slot {
        Slot::Authenticating { generation, .. } => *generation,
        _ => return,
    };
    if current != generation {
        return;
    }

    match outcome {
        Ok(session) => {
            info!("Session ready");
            *slot = Slot::Ready {
                session: Arc::clone(session),
            };
        }
        Err(e) => {
            warn!(error = %e, "Session resume failed");
            *slot = Slot::Invalid;
        }
    }
}
