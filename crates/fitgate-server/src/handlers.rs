//! Resource handlers.
//!
//! Every data handler goes through `SessionManager::with_session`, which
//! acquires the shared session and normalizes provider failures. Input is
//! validated before any provider call.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use fitgate_core::api::{ProviderClient, ProviderError};
use fitgate_core::auth::{Credentials, SessionError, SessionManager};
use fitgate_core::envelope::{ErrorEnvelope, ErrorKind};

use crate::reshape;

// ============================================================================
// Constants
// ============================================================================

/// Name reported by `/health`
const SERVICE_NAME: &str = "fitgate";

/// Activities returned when `limit` is absent or unparsable
const DEFAULT_ACTIVITY_LIMIT: u32 = 10;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type AppState<P> = Arc<SessionManager<P>>;
type HandlerResult = Result<Json<Value>, ErrorEnvelope>;

/// The server's local calendar date.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date(raw: &str) -> Result<NaiveDate, ErrorEnvelope> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ErrorEnvelope::validation("Invalid date format. Use YYYY-MM-DD"))
}

// ============================================================================
// Session
// ============================================================================

pub async fn health<P: ProviderClient>(State(manager): State<AppState<P>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "session": manager.state().await,
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

pub async fn login<P: ProviderClient>(State(manager): State<AppState<P>>, body: Bytes) -> HandlerResult {
    let missing = || ErrorEnvelope::validation("Email and password required");

    let request: LoginRequest = serde_json::from_slice(&body).map_err(|_| missing())?;
    let credentials = Credentials::from_parts(request.email, request.password).ok_or_else(missing)?;
    debug!(email = %credentials.email(), "Login requested");

    let outcome = manager.login(credentials).await.map_err(|e| match e {
        SessionError::Rejected(reason) => {
            ErrorEnvelope::new(ErrorKind::AuthenticationFailure, "Invalid credentials")
                .with_details(reason)
        }
        other => ErrorEnvelope::from(other),
    })?;
    info!(path = %outcome.token_path.display(), "Login successful, tokens saved");

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "tokenPath": outcome.token_path.display().to_string(),
    })))
}

// ============================================================================
// Data resources
// ============================================================================

pub async fn user<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    let (full_name, device) = manager
        .with_session(|client, session| async move {
            let full_name = client.full_name(&session).await?;
            let device = client.device_last_used(&session).await?;
            Ok::<_, ProviderError>((full_name, device))
        })
        .await?;
    Ok(Json(reshape::user(full_name, device)))
}

async fn daily_stats<P: ProviderClient>(manager: &SessionManager<P>, date: NaiveDate) -> HandlerResult {
    let summary = manager
        .with_session(|client, session| async move { client.user_summary(&session, date).await })
        .await?;
    Ok(Json(reshape::daily_stats(date, summary)))
}

pub async fn stats_today<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    daily_stats(&manager, today()).await
}

pub async fn stats_for_date<P: ProviderClient>(
    State(manager): State<AppState<P>>,
    Path(raw): Path<String>,
) -> HandlerResult {
    let date = parse_date(&raw)?;
    daily_stats(&manager, date).await
}

async fn heart_rate<P: ProviderClient>(manager: &SessionManager<P>, date: NaiveDate) -> HandlerResult {
    let record = manager
        .with_session(|client, session| async move { client.heart_rates(&session, date).await })
        .await?;
    Ok(Json(reshape::heart_rate(date, record)))
}

pub async fn heart_rate_today<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    heart_rate(&manager, today()).await
}

pub async fn heart_rate_for_date<P: ProviderClient>(
    State(manager): State<AppState<P>>,
    Path(raw): Path<String>,
) -> HandlerResult {
    let date = parse_date(&raw)?;
    heart_rate(&manager, date).await
}

#[derive(Debug, Deserialize)]
pub struct ActivitiesQuery {
    limit: Option<String>,
}

impl ActivitiesQuery {
    fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
    }
}

pub async fn activities<P: ProviderClient>(
    State(manager): State<AppState<P>>,
    Query(query): Query<ActivitiesQuery>,
) -> HandlerResult {
    let limit = query.limit();
    let items = manager
        .with_session(|client, session| async move { client.activities(&session, 0, limit).await })
        .await?;
    Ok(Json(reshape::activities(items)))
}

pub async fn hydration_today<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    let date = today();
    let record = manager
        .with_session(|client, session| async move { client.hydration(&session, date).await })
        .await?;
    Ok(Json(reshape::hydration(date, record)))
}

pub async fn sleep_today<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    let date = today();
    let record = manager
        .with_session(|client, session| async move { client.sleep(&session, date).await })
        .await?;
    Ok(Json(reshape::dated(date, "sleepData", record)))
}

pub async fn stress_today<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    let date = today();
    let record = manager
        .with_session(|client, session| async move { client.stress(&session, date).await })
        .await?;
    Ok(Json(reshape::dated(date, "stressData", record)))
}

pub async fn body_composition<P: ProviderClient>(State(manager): State<AppState<P>>) -> HandlerResult {
    let date = today();
    let record = manager
        .with_session(|client, session| async move { client.body_composition(&session, date).await })
        .await?;
    Ok(Json(reshape::dated(date, "bodyComposition", record)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-15").expect("valid"),
            NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date")
        );
        for bad in ["2024-13-01", "2024-02-30", "yesterday", "", "15/01/2024"] {
            let err = parse_date(bad).err().expect("rejected");
            assert_eq!(err.kind, ErrorKind::ValidationFailure);
            assert_eq!(err.http_status, 400);
        }
    }

    #[test]
    fn test_activity_limit_fallback() {
        let query = |raw: Option<&str>| ActivitiesQuery {
            limit: raw.map(String::from),
        };
        assert_eq!(query(None).limit(), 10);
        assert_eq!(query(Some("25")).limit(), 25);
        assert_eq!(query(Some("abc")).limit(), 10);
        assert_eq!(query(Some("-3")).limit(), 10);
    }
}
