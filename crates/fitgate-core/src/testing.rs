//! Scripted in-memory provider for tests.
//!
//! The token store is a plain file holding one token string. Tokens issued by
//! a successful login, plus any registered with `accept_token`, resume
//! successfully; everything else is rejected. Failures and records can be
//! scripted per test, and every call is counted.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::api::{ProviderClient, ProviderError, ProviderResult};
use crate::auth::{token_store, Credentials};

#[derive(Debug)]
pub struct FakeSession {
    pub token: String,
}

#[derive(Default)]
struct Script {
    accepted: HashSet<String>,
    resume_failure: Option<ProviderError>,
    login_failure: Option<ProviderError>,
    data_failure: Option<ProviderError>,
    records: HashMap<String, Value>,
    resume_delay: Option<Duration>,
    login_delay: Option<Duration>,
    issued: usize,
}

pub struct ScriptedProvider {
    password: String,
    script: Mutex<Script>,
    resume_calls: AtomicUsize,
    login_calls: AtomicUsize,
    data_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// A provider whose only valid login password is `password`.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            script: Mutex::new(Script::default()),
            resume_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            data_calls: AtomicUsize::new(0),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn accept_token(&self, token: impl Into<String>) {
        self.script().accepted.insert(token.into());
    }

    pub fn fail_resume_with(&self, err: ProviderError) {
        self.script().resume_failure = Some(err);
    }

    pub fn clear_resume_failure(&self) {
        self.script().resume_failure = None;
    }

    pub fn fail_login_with(&self, err: ProviderError) {
        self.script().login_failure = Some(err);
    }

    pub fn fail_data_with(&self, err: ProviderError) {
        self.script().data_failure = Some(err);
    }

    pub fn clear_data_failure(&self) {
        self.script().data_failure = None;
    }

    /// Record returned by the data call named `call` (e.g. `"user_summary"`).
    /// Unset records come back as `null`.
    pub fn set_record(&self, call: &str, record: Value) {
        self.script().records.insert(call.to_string(), record);
    }

    pub fn set_resume_delay(&self, delay: Duration) {
        self.script().resume_delay = Some(delay);
    }

    pub fn set_login_delay(&self, delay: Duration) {
        self.script().login_delay = Some(delay);
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn data_calls(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    fn record(&self, call: &str) -> ProviderResult<Value> {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script();
        if let Some(ref err) = script.data_failure {
            return Err(err.clone());
        }
        Ok(script.records.get(call).cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    type Session = FakeSession;

    async fn resume(&self, token_store: &Path) -> ProviderResult<FakeSession> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.script().resume_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.script().resume_failure.clone();
        if let Some(err) = failure {
            return Err(err);
        }

        let token = tokio::fs::read_to_string(token_store)
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))?
            .trim()
            .to_string();
        if self.script().accepted.contains(&token) {
            Ok(FakeSession { token })
        } else {
            Err(ProviderError::Authentication("Unknown token".to_string()))
        }
    }

    async fn login(&self, credentials: &Credentials) -> ProviderResult<FakeSession> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.script().login_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script();
        if let Some(ref err) = script.login_failure {
            return Err(err.clone());
        }
        if credentials.password() != self.password {
            return Err(ProviderError::Authentication("Invalid credentials".to_string()));
        }

        script.issued += 1;
        let token = format!("issued-{}-{}", credentials.email(), script.issued);
        script.accepted.insert(token.clone());
        Ok(FakeSession { token })
    }

    async fn dump_tokens(&self, session: &FakeSession, token_store: &Path) -> ProviderResult<()> {
        token_store::write_atomic(token_store, session.token.as_bytes())
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))
    }

    async fn full_name(&self, _session: &FakeSession) -> ProviderResult<Option<String>> {
        Ok(self.record("full_name")?.as_str().map(String::from))
    }

    async fn device_last_used(&self, _session: &FakeSession) -> ProviderResult<Value> {
        self.record("device_last_used")
    }

    async fn user_summary(&self, _session: &FakeSession, _date: NaiveDate) -> ProviderResult<Value> {
        self.record("user_summary")
    }

    async fn heart_rates(&self, _session: &FakeSession, _date: NaiveDate) -> ProviderResult<Value> {
        self.record("heart_rates")
    }

    async fn activities(
        &self,
        _session: &FakeSession,
        start: u32,
        limit: u32,
    ) -> ProviderResult<Vec<Value>> {
        let items = match self.record("activities")? {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .skip(start as usize)
            .take(limit as usize)
            .collect())
    }

    async fn hydration(&self, _session: &FakeSession, _date: NaiveDate) -> ProviderResult<Value> {
        self.record("hydration")
    }

    async fn sleep(&self, _session: &FakeSession, _date: NaiveDate) -> ProviderResult<Value> {
        self.record("sleep")
    }

    async fn stress(&self, _session: &FakeSession, _date: NaiveDate) -> ProviderResult<Value> {
        self.record("stress")
    }

    async fn body_composition(
        &self,
        _session: &FakeSession,
        _date: NaiveDate,
    ) -> ProviderResult<Value> {
        self.record("body_composition")
    }
}
