//! Readiness of the candidate cache behind the listing endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use offerank_db::{DbPool, SqlCandidateRepository};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    cache: Arc<SqlCandidateRepository>,
}

impl HealthState {
    pub fn new(db_pool: DbPool) -> Self {
        Self { cache: Arc::new(SqlCandidateRepository::new(db_pool)) }
    }
}

/// `candidates`/`suitable` are absent when the cache could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheReadiness {
    pub status: &'static str,
    pub candidates: Option<i64>,
    pub suitable: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache: CacheReadiness,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(db_pool))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let cache = match state.cache.stats().await {
        Ok(stats) => CacheReadiness {
            status: "ready",
            candidates: Some(stats.candidates),
            suitable: Some(stats.suitable),
            error: None,
        },
        Err(error) => {
            warn!(
                event_name = "system.health.cache_unavailable",
                correlation_id = "health",
                error = %error,
                "candidate cache is not readable"
            );
            CacheReadiness {
                status: "degraded",
                candidates: None,
                suitable: None,
                error: Some(error.to_string()),
            }
        }
    };

    let status_code =
        if cache.error.is_none() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let payload = HealthResponse {
        status: cache.status,
        cache,
        checked_at: Utc::now().to_rfc3339(),
    };
    (status_code, Json(payload))
}
