use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use super::ports::{CandidateQuery, CandidateStore, StoreError};
use crate::domain::candidate::{Candidate, CandidateId};

/// Process-local candidate cache with the same ordering and matching rules as
/// the SQL repository.
#[derive(Default)]
pub struct InMemoryCandidateStore {
    candidates: RwLock<HashMap<String, Candidate>>,
    updates: AtomicUsize,
}

impl InMemoryCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `update` calls served so far.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.candidates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.candidates.read().await.is_empty()
    }
}

pub(crate) fn title_matches(title: &str, matching_text: &str) -> bool {
    title.to_lowercase().contains(&matching_text.to_lowercase())
}

#[async_trait::async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn exists(&self, id: &CandidateId) -> Result<bool, StoreError> {
        let candidates = self.candidates.read().await;
        Ok(candidates.contains_key(&id.0))
    }

    async fn insert(&self, candidate: Candidate) -> Result<bool, StoreError> {
        let mut candidates = self.candidates.write().await;
        if candidates.contains_key(&candidate.id.0) {
            return Ok(false);
        }
        candidates.insert(candidate.id.0.clone(), candidate);
        Ok(true)
    }

    async fn query(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, StoreError> {
        let candidates = self.candidates.read().await;
        let mut matching: Vec<Candidate> = candidates
            .values()
            .filter(|candidate| !query.suitable_only || candidate.suitable)
            .filter(|candidate| title_matches(&candidate.title, &query.matching_text))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }

    async fn update(&self, candidate: &Candidate) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut candidates = self.candidates.write().await;
        match candidates.get_mut(&candidate.id.0) {
            Some(stored) => {
                *stored = candidate.clone();
                Ok(())
            }
            None => {
                Err(StoreError::Backend(format!("candidate `{}` does not exist", candidate.id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::InMemoryCandidateStore;
    use crate::catalog::ports::{CandidateQuery, CandidateStore, StoreError};
    use crate::domain::candidate::{Candidate, CandidateId};

    fn candidate(id: &str, title: &str, suitable: bool, age_minutes: i64) -> Candidate {
        Candidate {
            id: CandidateId(id.to_string()),
            identifier: None,
            title: title.to_string(),
            price: Some(100.0),
            characteristics: Vec::new(),
            suitable,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn insert_is_a_no_op_for_known_ids() {
        let store = InMemoryCandidateStore::new();

        assert!(store.insert(candidate("p-1", "power bank", true, 0)).await.expect("insert"));
        assert!(!store.insert(candidate("p-1", "other", false, 0)).await.expect("insert"));

        let stored = store.query(&CandidateQuery::population("power")).await.expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "power bank");
        assert!(store.exists(&CandidateId("p-1".to_string())).await.expect("exists"));
    }

    #[tokio::test]
    async fn query_filters_by_title_and_flag_newest_first() {
        let store = InMemoryCandidateStore::new();
        store.insert(candidate("old", "power bank a", true, 30)).await.expect("insert");
        store.insert(candidate("new", "Power Bank b", true, 1)).await.expect("insert");
        store.insert(candidate("bad", "power bank c", false, 5)).await.expect("insert");
        store.insert(candidate("other", "charger", true, 0)).await.expect("insert");

        let suitable =
            store.query(&CandidateQuery::suitable("power bank", 10)).await.expect("query");
        let ids: Vec<&str> = suitable.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);

        let limited = store.query(&CandidateQuery::suitable("power bank", 1)).await.expect("query");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id.0, "new");
    }

    #[tokio::test]
    async fn updating_unknown_candidate_fails() {
        let store = InMemoryCandidateStore::new();
        let error =
            store.update(&candidate("ghost", "power bank", true, 0)).await.expect_err("unknown");

        assert!(matches!(error, StoreError::Backend(_)));
    }
}
