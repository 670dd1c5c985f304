//! fitgate HTTP server.
//!
//! Routes are served at the root and, for clients written against the
//! provider's reference REST server, again under `/api`.

pub mod cors;
pub mod handlers;
pub mod reshape;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use fitgate_core::api::ProviderClient;
use fitgate_core::auth::SessionManager;

/// Prefix the reference REST server mounts its routes under
pub const API_PREFIX: &str = "/api";

/// Build the application router around one shared session manager.
pub fn router<P: ProviderClient>(manager: Arc<SessionManager<P>>) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::<P>))
        .route("/login", post(handlers::login::<P>))
        .route("/user", get(handlers::user::<P>))
        .route("/stats/today", get(handlers::stats_today::<P>))
        .route("/stats/date/:date", get(handlers::stats_for_date::<P>))
        .route("/heartrate/today", get(handlers::heart_rate_today::<P>))
        .route("/heartrate/date/:date", get(handlers::heart_rate_for_date::<P>))
        .route("/activities", get(handlers::activities::<P>))
        .route("/hydration/today", get(handlers::hydration_today::<P>))
        .route("/sleep/today", get(handlers::sleep_today::<P>))
        .route("/stress/today", get(handlers::stress_today::<P>))
        .route("/body-composition", get(handlers::body_composition::<P>))
        .with_state(manager);

    Router::new().nest(API_PREFIX, routes.clone()).merge(routes)
}
