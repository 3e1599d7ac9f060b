//! Ranking and listing endpoints.
//!
//! `POST /rank` returns items sorted by ascending score; **lower is better**.
//! `GET /products?query=&limit=` serves suitable cached candidates and tops
//! the cache up from the catalog when it falls short.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use offerank_core::{
    decode_ranking_items, rank_items, ApplicationError, InterfaceError, Listing, ListingRequest,
    ListingService, RankedItem,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    listing: Arc<ListingService>,
    default_limit: u32,
}

impl ApiState {
    pub fn new(listing: Arc<ListingService>, default_limit: u32) -> Self {
        Self { listing, default_limit }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub query: Option<String>,
    pub limit: Option<String>,
}

pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        // Only validation details are safe to echo back.
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            other => other.user_message().to_string(),
        };
        let body = ErrorBody {
            error: code.to_string(),
            message,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn reject(endpoint: &'static str, correlation_id: &str, error: ApplicationError) -> ApiError {
    let interface = error.into_interface(correlation_id);
    match &interface {
        InterfaceError::BadRequest { message, .. } => warn!(
            event_name = "api.request.rejected",
            endpoint,
            correlation_id,
            error = %message,
            "request rejected"
        ),
        other => error!(
            event_name = "api.request.failed",
            endpoint,
            correlation_id,
            error = %other.message(),
            "request failed"
        ),
    }
    ApiError(interface)
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/rank", post(rank))
        .route("/products", get(products))
        .with_state(state)
}

/// Ranks the posted items; the response is ordered best (lowest score) first.
pub async fn rank(body: Bytes) -> Result<Json<Vec<RankedItem>>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let ranked = decode_ranking_items(&body)
        .and_then(|items| rank_items(&items))
        .map_err(|error| reject("rank", &correlation_id, error))?;

    info!(
        event_name = "api.rank.completed",
        correlation_id = %correlation_id,
        items = ranked.len(),
        "ranking served"
    );
    Ok(Json(ranked))
}

pub async fn products(
    State(state): State<ApiState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<Listing>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let request = ListingRequest::parse(
        params.query.as_deref(),
        params.limit.as_deref(),
        state.default_limit,
    )
    .map_err(|error| reject("products", &correlation_id, error))?;

    let listing = state
        .listing
        .list(&request)
        .await
        .map_err(|error| reject("products", &correlation_id, error))?;
    Ok(Json(listing))
}
