//! Listing entrypoint: serve suitable candidates from the cache and acquire
//! more when the cache falls short.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::acquisition::AcquisitionLoop;
use super::ports::{CandidateQuery, CandidateStore};
use crate::domain::candidate::{Candidate, Characteristic};
use crate::errors::ApplicationError;

pub const DEFAULT_LISTING_LIMIT: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingRequest {
    query: String,
    limit: u32,
}

impl ListingRequest {
    /// Normalizes the query (trimmed, lower-cased) and validates the limit.
    /// A missing limit falls back to `default_limit`.
    pub fn parse(
        query: Option<&str>,
        limit: Option<&str>,
        default_limit: u32,
    ) -> Result<Self, ApplicationError> {
        let query = query.unwrap_or_default().trim().to_lowercase();
        if query.is_empty() {
            return Err(ApplicationError::Validation("query must not be empty".to_string()));
        }

        let limit = match limit.map(str::trim) {
            None | Some("") => i64::from(default_limit),
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                ApplicationError::Validation(format!("limit must be an integer, got `{raw}`"))
            })?,
        };
        if limit < 1 {
            return Err(ApplicationError::Validation(format!("limit must be >= 1, got {limit}")));
        }
        let limit = u32::try_from(limit).map_err(|_| {
            ApplicationError::Validation(format!("limit must be <= {}, got {limit}", u32::MAX))
        })?;

        Ok(Self { query, limit })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Candidate as exposed to listing callers; the suitability flag stays
/// internal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListedCandidate {
    pub id: String,
    pub identifier: Option<String>,
    pub title: String,
    pub price: Option<f64>,
    pub characteristics: Vec<Characteristic>,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for ListedCandidate {
    fn from(value: Candidate) -> Self {
        Self {
            id: value.id.0,
            identifier: value.identifier,
            title: value.title,
            price: value.price,
            characteristics: value.characteristics,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub count: usize,
    pub items: Vec<ListedCandidate>,
}

/// One async lock per normalized query, so a query never runs two
/// acquisitions at once. Entries live only while some listing holds or waits
/// for them.
#[derive(Default)]
pub struct QueryLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held for the duration of one acquisition; dropping it releases the query.
pub struct QueryGuard<'a> {
    locks: &'a QueryLocks,
    query: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl QueryLocks {
    pub async fn acquire(&self, query: &str) -> QueryGuard<'_> {
        let lock = self.lock_for(query);
        QueryGuard { locks: self, query: query.to_string(), guard: Some(lock.lock_owned().await) }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, query: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.entries().entry(query.to_string()).or_default().clone()
    }

    // Only the map's own reference left means nobody holds or awaits the lock.
    fn prune(&self, query: &str) {
        let mut locks = self.entries();
        if locks.get(query).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(query);
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune(&self.query);
    }
}

pub struct ListingService {
    store: Arc<dyn CandidateStore>,
    acquisition: AcquisitionLoop,
    locks: QueryLocks,
}

impl ListingService {
    pub fn new(store: Arc<dyn CandidateStore>, acquisition: AcquisitionLoop) -> Self {
        Self { store, acquisition, locks: QueryLocks::default() }
    }

    pub async fn list(&self, request: &ListingRequest) -> Result<Listing, ApplicationError> {
        let cached = self.cached(request).await?;
        if cached.len() >= request.limit() as usize {
            return Ok(Self::listing(request, cached, false));
        }

        let _guard = self.locks.acquire(request.query()).await;

        // Another request may have filled the cache while this one waited.
        let cached = self.cached(request).await?;
        if cached.len() >= request.limit() as usize {
            return Ok(Self::listing(request, cached, false));
        }

        let report = self.acquisition.run(request.query(), request.limit() as usize).await?;
        if report.suitable < request.limit() as usize {
            warn!(
                event_name = "catalog.listing.short",
                query = request.query(),
                limit = request.limit(),
                suitable = report.suitable,
                "fewer suitable candidates than requested"
            );
        }

        let cached = self.cached(request).await?;
        Ok(Self::listing(request, cached, true))
    }

    async fn cached(&self, request: &ListingRequest) -> Result<Vec<Candidate>, ApplicationError> {
        let query = CandidateQuery::suitable(request.query(), request.limit());
        Ok(self.store.query(&query).await?)
    }

    fn listing(request: &ListingRequest, candidates: Vec<Candidate>, acquired: bool) -> Listing {
        let items: Vec<ListedCandidate> =
            candidates.into_iter().map(ListedCandidate::from).collect();
        info!(
            event_name = "catalog.listing.served",
            query = request.query(),
            limit = request.limit(),
            count = items.len(),
            acquired,
            "listing served"
        );
        Listing { count: items.len(), items }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{ListingRequest, ListingService, QueryLocks, DEFAULT_LISTING_LIMIT};
    use crate::catalog::acquisition::AcquisitionLoop;
    use crate::catalog::memory::InMemoryCandidateStore;
    use crate::catalog::ports::{
        CandidateStore, NoPacer, ProductEnricher, ProductSource, UpstreamError,
    };
    use crate::domain::candidate::{Candidate, CandidateId, Enrichment, RawCandidate};
    use crate::errors::ApplicationError;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProductSource for CountingSource {
        async fn fetch(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<RawCandidate>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..limit)
                .map(|i| RawCandidate {
                    id: CandidateId(format!("fresh-{i}")),
                    identifier: None,
                    title: format!("{query} ({i})"),
                })
                .collect())
        }
    }

    struct PricedEnricher;

    #[async_trait]
    impl ProductEnricher for PricedEnricher {
        async fn enrich(
            &self,
            _candidate: &RawCandidate,
        ) -> Result<Option<Enrichment>, UpstreamError> {
            Ok(Some(Enrichment { characteristics: Vec::new(), price: Some(10.0) }))
        }
    }

    fn service(store: Arc<InMemoryCandidateStore>, source: Arc<CountingSource>) -> ListingService {
        let acquisition = AcquisitionLoop::new(
            source,
            Arc::new(PricedEnricher),
            store.clone(),
            Arc::new(NoPacer),
        );
        ListingService::new(store, acquisition)
    }

    #[test]
    fn request_is_normalized_and_validated() {
        let request =
            ListingRequest::parse(Some("  Power Bank "), None, DEFAULT_LISTING_LIMIT).expect("ok");
        assert_eq!(request.query(), "power bank");
        assert_eq!(request.limit(), 10);

        for (query, limit) in
            [
                (None, Some("3")),
                (Some("   "), Some("3")),
                (Some("x"), Some("0")),
                (Some("x"), Some("ten")),
            ]
        {
            assert!(matches!(
                ListingRequest::parse(query, limit, DEFAULT_LISTING_LIMIT),
                Err(ApplicationError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_acquisition() {
        let store = Arc::new(InMemoryCandidateStore::new());
        for i in 0..2 {
            store
                .insert(Candidate {
                    id: CandidateId(format!("cached-{i}")),
                    identifier: None,
                    title: "power bank".to_string(),
                    price: Some(1.0),
                    characteristics: Vec::new(),
                    suitable: true,
                    created_at: Utc::now(),
                })
                .await
                .expect("seed");
        }
        let source = Arc::new(CountingSource::default());
        let request = ListingRequest::parse(Some("power bank"), Some("2"), 10).expect("request");

        let listing = service(store, source.clone()).list(&request).await.expect("listing");

        assert_eq!(listing.count, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_miss_acquires_then_serves_from_cache() {
        let store = Arc::new(InMemoryCandidateStore::new());
        let source = Arc::new(CountingSource::default());
        let request = ListingRequest::parse(Some("power bank"), Some("3"), 10).expect("request");

        let listing = service(store.clone(), source.clone()).list(&request).await.expect("listing");

        assert_eq!(listing.count, 3);
        assert_eq!(listing.items.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 3);
        let encoded = serde_json::to_value(&listing).expect("encode");
        assert!(encoded["items"][0].get("suitable").is_none());
    }

    #[test]
    fn query_locks_are_shared_per_query() {
        let locks = QueryLocks::default();

        assert!(Arc::ptr_eq(&locks.lock_for("a"), &locks.lock_for("a")));
        assert!(!Arc::ptr_eq(&locks.lock_for("a"), &locks.lock_for("b")));
    }

    #[tokio::test]
    async fn query_locks_are_released_once_every_holder_is_done() {
        let locks = QueryLocks::default();

        for i in 0..1000 {
            let _guard = locks.acquire(&format!("query {i}")).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());

        let first = locks.acquire("power bank").await;
        let waiting = locks.lock_for("power bank");
        drop(first);
        assert_eq!(locks.len(), 1, "a waiting listing keeps the entry alive");
        drop(waiting);
        drop(locks.acquire("power bank").await);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn finished_listings_leave_no_query_locks_behind() {
        let store = Arc::new(InMemoryCandidateStore::new());
        let listings = service(store, Arc::new(CountingSource::default()));

        for query in ["power bank", "usb cable", "charger"] {
            let request = ListingRequest::parse(Some(query), Some("2"), 10).expect("request");
            listings.list(&request).await.expect("listing");
        }

        assert!(listings.locks.is_empty());
    }
}
