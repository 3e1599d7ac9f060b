//! Boundaries of the acquisition engine: the external catalog, the enricher,
//! the candidate cache and the courtesy pacing between upstream calls.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

use crate::domain::candidate::{Candidate, CandidateId, Enrichment, RawCandidate};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("candidate store backend error: {0}")]
    Backend(String),
    #[error("candidate store decode error: {0}")]
    Decode(String),
}

/// Paged external catalog. Returning fewer than `limit` items is allowed; an
/// empty batch means the source has nothing more for this query.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, UpstreamError>;
}

/// Resolves characteristics and price for one raw candidate. `Ok(None)` and
/// errors both drop the candidate for the current attempt only.
#[async_trait]
pub trait ProductEnricher: Send + Sync {
    async fn enrich(&self, candidate: &RawCandidate) -> Result<Option<Enrichment>, UpstreamError>;
}

/// Filter for [`CandidateStore::query`]. Results are always newest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Case-insensitive substring of the title.
    pub matching_text: String,
    pub suitable_only: bool,
    pub limit: Option<u32>,
}

impl CandidateQuery {
    pub fn population(matching_text: impl Into<String>) -> Self {
        Self { matching_text: matching_text.into(), suitable_only: false, limit: None }
    }

    pub fn suitable(matching_text: impl Into<String>, limit: u32) -> Self {
        Self { matching_text: matching_text.into(), suitable_only: true, limit: Some(limit) }
    }
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn exists(&self, id: &CandidateId) -> Result<bool, StoreError>;

    /// Inserts a new candidate. Returns `false` without touching the stored
    /// row when the id is already known.
    async fn insert(&self, candidate: Candidate) -> Result<bool, StoreError>;

    async fn query(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, StoreError>;

    async fn update(&self, candidate: &Candidate) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Sleeps for a uniformly random duration in `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomPacer {
    min: Duration,
    max: Duration,
}

impl RandomPacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn next_delay(&self) -> Duration {
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

#[async_trait]
impl Pacer for RandomPacer {
    async fn pause(&self) {
        let delay = self.next_delay();
        tokio::time::sleep(delay).await;
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoPacer;

#[async_trait]
impl Pacer for NoPacer {
    async fn pause(&self) {}
}
