//! Bounded acquisition of new candidates for one query.
//!
//! Each attempt walks `Fetching -> Enriching -> Reclassifying` and then
//! converges, continues with a widened fetch, or is exhausted. Upstream
//! failures end the loop without an error; store failures abort it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::ports::{CandidateQuery, CandidateStore, Pacer, ProductEnricher, ProductSource};
use super::suitability::SuitabilityClassifier;
use crate::domain::candidate::RawCandidate;
use crate::errors::ApplicationError;

pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug, PartialEq)]
pub enum AcquisitionState {
    Fetching { attempt: u32, limit: usize },
    Enriching { attempt: u32, batch: Vec<RawCandidate> },
    Reclassifying { attempt: u32 },
    Finished(AcquisitionOutcome),
}

impl AcquisitionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching { .. } => "fetching",
            Self::Enriching { .. } => "enriching",
            Self::Reclassifying { .. } => "reclassifying",
            Self::Finished(AcquisitionOutcome::Converged) => "converged",
            Self::Finished(AcquisitionOutcome::Exhausted(_)) => "exhausted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    Converged,
    Exhausted(ExhaustionReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExhaustionReason {
    EmptyBatch,
    SourceFailed(String),
    AttemptsSpent,
}

/// Decision taken after reclassification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Converged,
    ContinueNextAttempt { limit: usize },
    Exhausted,
}

/// Converges once `suitable >= needed`. Otherwise widens the next fetch by
/// the population already seen, unless `attempt` was the last one allowed.
pub fn next_transition(
    attempt: u32,
    max_attempts: u32,
    needed: usize,
    suitable: usize,
    population: usize,
) -> Transition {
    if suitable >= needed {
        return Transition::Converged;
    }
    if attempt >= max_attempts {
        return Transition::Exhausted;
    }
    Transition::ContinueNextAttempt { limit: needed - suitable + population }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub outcome: AcquisitionOutcome,
    pub attempts: u32,
    pub inserted: usize,
    pub dropped: usize,
    pub population: usize,
    pub suitable: usize,
}

pub struct AcquisitionLoop {
    source: Arc<dyn ProductSource>,
    enricher: Arc<dyn ProductEnricher>,
    store: Arc<dyn CandidateStore>,
    pacer: Arc<dyn Pacer>,
    classifier: SuitabilityClassifier,
    max_attempts: u32,
}

impl AcquisitionLoop {
    pub fn new(
        source: Arc<dyn ProductSource>,
        enricher: Arc<dyn ProductEnricher>,
        store: Arc<dyn CandidateStore>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            source,
            enricher,
            store,
            pacer,
            classifier: SuitabilityClassifier::default(),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_classifier(mut self, classifier: SuitabilityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn CandidateStore> {
        &self.store
    }

    /// Runs until `needed` suitable candidates match `query` or the loop is
    /// exhausted. Both are successful outcomes; only store failures error.
    pub async fn run(
        &self,
        query: &str,
        needed: usize,
    ) -> Result<AcquisitionReport, ApplicationError> {
        let mut report = AcquisitionReport {
            outcome: AcquisitionOutcome::Converged,
            attempts: 0,
            inserted: 0,
            dropped: 0,
            population: 0,
            suitable: 0,
        };
        let mut state = AcquisitionState::Fetching { attempt: 1, limit: needed };

        loop {
            state = match state {
                AcquisitionState::Fetching { attempt, limit } => {
                    report.attempts = attempt;
                    info!(
                        event_name = "catalog.acquisition.fetch",
                        query,
                        attempt,
                        needed,
                        limit,
                        "fetching candidates"
                    );
                    match self.source.fetch(query, limit).await {
                        Ok(batch) if batch.is_empty() => {
                            warn!(
                                event_name = "catalog.acquisition.empty_batch",
                                query,
                                attempt,
                                "source returned no candidates"
                            );
                            AcquisitionState::Finished(AcquisitionOutcome::Exhausted(
                                ExhaustionReason::EmptyBatch,
                            ))
                        }
                        Ok(batch) => AcquisitionState::Enriching { attempt, batch },
                        Err(error) => {
                            warn!(
                                event_name = "catalog.acquisition.source_failed",
                                query,
                                attempt,
                                error = %error,
                                "source fetch failed"
                            );
                            AcquisitionState::Finished(AcquisitionOutcome::Exhausted(
                                ExhaustionReason::SourceFailed(error.to_string()),
                            ))
                        }
                    }
                }
                AcquisitionState::Enriching { attempt, batch } => {
                    let (inserted, dropped) = self.enrich_batch(batch).await?;
                    report.inserted += inserted;
                    report.dropped += dropped;
                    AcquisitionState::Reclassifying { attempt }
                }
                AcquisitionState::Reclassifying { attempt } => {
                    let population =
                        self.store.query(&CandidateQuery::population(query)).await?;
                    let reclassified =
                        self.classifier.reclassify(self.store.as_ref(), &population).await?;
                    report.population = reclassified.population;
                    report.suitable = reclassified.suitable;
                    info!(
                        event_name = "catalog.acquisition.reclassified",
                        query,
                        attempt,
                        suitable = reclassified.suitable,
                        population = reclassified.population,
                        updated = reclassified.updated.len(),
                        needed,
                        "population reclassified"
                    );

                    match next_transition(
                        attempt,
                        self.max_attempts,
                        needed,
                        reclassified.suitable,
                        reclassified.population,
                    ) {
                        Transition::Converged => {
                            AcquisitionState::Finished(AcquisitionOutcome::Converged)
                        }
                        Transition::ContinueNextAttempt { limit } => {
                            AcquisitionState::Fetching { attempt: attempt + 1, limit }
                        }
                        Transition::Exhausted => AcquisitionState::Finished(
                            AcquisitionOutcome::Exhausted(ExhaustionReason::AttemptsSpent),
                        ),
                    }
                }
                AcquisitionState::Finished(outcome) => {
                    info!(
                        event_name = "catalog.acquisition.finished",
                        query,
                        attempts = report.attempts,
                        inserted = report.inserted,
                        dropped = report.dropped,
                        outcome = ?outcome,
                        "acquisition finished"
                    );
                    report.outcome = outcome;
                    return Ok(report);
                }
            };
        }
    }

    /// Enriches and stores the unknown candidates of one batch, pacing
    /// between upstream calls. Returns `(inserted, dropped)`.
    async fn enrich_batch(
        &self,
        batch: Vec<RawCandidate>,
    ) -> Result<(usize, usize), ApplicationError> {
        let mut inserted = 0;
        let mut dropped = 0;
        let mut calls = 0;

        for raw in batch {
            if self.store.exists(&raw.id).await? {
                continue;
            }
            if calls > 0 {
                self.pacer.pause().await;
            }
            calls += 1;

            match self.enricher.enrich(&raw).await {
                Ok(Some(enrichment)) => {
                    let id = raw.id.clone();
                    let candidate = raw.into_candidate(enrichment, Utc::now());
                    if self.store.insert(candidate).await? {
                        inserted += 1;
                    } else {
                        info!(
                            event_name = "catalog.acquisition.duplicate",
                            candidate_id = %id,
                            "candidate already stored"
                        );
                    }
                }
                Ok(None) => {
                    dropped += 1;
                    warn!(
                        event_name = "catalog.acquisition.enrichment_incomplete",
                        candidate_id = %raw.id,
                        "dropping candidate"
                    );
                }
                Err(error) => {
                    dropped += 1;
                    warn!(
                        event_name = "catalog.acquisition.enrichment_failed",
                        candidate_id = %raw.id,
                        error = %error,
                        "dropping candidate"
                    );
                }
            }
        }

        Ok((inserted, dropped))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{
        next_transition, AcquisitionLoop, AcquisitionOutcome, ExhaustionReason, Transition,
        MAX_ATTEMPTS,
    };
    use crate::catalog::memory::InMemoryCandidateStore;
    use crate::catalog::ports::{
        CandidateStore, NoPacer, Pacer, ProductEnricher, ProductSource, UpstreamError,
    };
    use crate::domain::candidate::{
        Candidate, CandidateId, Characteristic, CharacteristicValue, Enrichment, RawCandidate,
    };

    fn raw(id: &str) -> RawCandidate {
        RawCandidate {
            id: CandidateId(id.to_string()),
            identifier: Some(id.to_uppercase()),
            title: format!("power bank ({id})"),
        }
    }

    /// Replays scripted batches and records the limits it was asked for.
    struct ScriptedSource {
        batches: Mutex<VecDeque<Result<Vec<RawCandidate>, UpstreamError>>>,
        limits: Mutex<Vec<usize>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Vec<RawCandidate>, UpstreamError>>) -> Self {
            Self { batches: Mutex::new(batches.into()), limits: Mutex::new(Vec::new()) }
        }

        fn limits(&self) -> Vec<usize> {
            self.limits.lock().expect("limits lock").clone()
        }
    }

    #[async_trait]
    impl ProductSource for ScriptedSource {
        async fn fetch(
            &self,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<RawCandidate>, UpstreamError> {
            self.limits.lock().expect("limits lock").push(limit);
            self.batches.lock().expect("batches lock").pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    /// Enriches every candidate with a price and Capacity, except ids listed
    /// as failing, incomplete or priceless.
    #[derive(Default)]
    struct FakeEnricher {
        failing: Vec<&'static str>,
        incomplete: Vec<&'static str>,
        priceless: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProductEnricher for FakeEnricher {
        async fn enrich(
            &self,
            candidate: &RawCandidate,
        ) -> Result<Option<Enrichment>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&candidate.id.0.as_str()) {
                return Err(UpstreamError::Status { status: 503, url: candidate.id.0.clone() });
            }
            if self.incomplete.contains(&candidate.id.0.as_str()) {
                return Ok(None);
            }
            let price = if self.priceless.contains(&candidate.id.0.as_str()) {
                None
            } else {
                Some(999.0)
            };
            Ok(Some(Enrichment {
                characteristics: vec![Characteristic {
                    requirement: "Capacity".to_string(),
                    value: Some(CharacteristicValue::Number(10000.0)),
                    unit: Some("mAh".to_string()),
                }],
                price,
            }))
        }
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: AtomicUsize,
    }

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn acquisition(
        source: Arc<ScriptedSource>,
        enricher: Arc<FakeEnricher>,
        store: Arc<InMemoryCandidateStore>,
    ) -> AcquisitionLoop {
        AcquisitionLoop::new(source, enricher, store, Arc::new(NoPacer))
    }

    #[test]
    fn transition_widens_limit_by_population() {
        assert_eq!(next_transition(1, 5, 10, 10, 12), Transition::Converged);
        assert_eq!(
            next_transition(1, 5, 10, 4, 6),
            Transition::ContinueNextAttempt { limit: 12 }
        );
        assert_eq!(next_transition(5, 5, 10, 4, 6), Transition::Exhausted);
    }

    #[tokio::test]
    async fn empty_first_batch_exhausts_after_one_attempt() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(Vec::new())]));
        let store = Arc::new(InMemoryCandidateStore::new());
        let report = acquisition(source.clone(), Arc::default(), store.clone())
            .run("power bank", 3)
            .await
            .expect("acquisition");

        assert_eq!(report.outcome, AcquisitionOutcome::Exhausted(ExhaustionReason::EmptyBatch));
        assert_eq!(report.attempts, 1);
        assert_eq!(report.inserted, 0);
        assert!(store.is_empty().await);
        assert_eq!(source.limits(), vec![3]);
    }

    #[tokio::test]
    async fn sufficient_batch_converges_in_one_attempt() {
        let source =
            Arc::new(ScriptedSource::new(vec![Ok(vec![raw("a-1"), raw("a-2"), raw("a-3")])]));
        let store = Arc::new(InMemoryCandidateStore::new());
        let report = acquisition(source.clone(), Arc::default(), store.clone())
            .run("power bank", 3)
            .await
            .expect("acquisition");

        assert_eq!(report.outcome, AcquisitionOutcome::Converged);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.suitable, 3);
        assert_eq!(source.limits(), vec![3]);
    }

    #[tokio::test]
    async fn failed_enrichment_drops_only_that_candidate() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![raw("a-1"), raw("a-2"), raw("a-3")]),
            Ok(vec![raw("a-4")]),
        ]));
        let enricher = Arc::new(FakeEnricher { failing: vec!["a-2"], ..FakeEnricher::default() });
        let store = Arc::new(InMemoryCandidateStore::new());
        let report = acquisition(source.clone(), enricher, store.clone())
            .run("power bank", 3)
            .await
            .expect("acquisition");

        assert_eq!(report.outcome, AcquisitionOutcome::Converged);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.inserted, 3);
        assert!(!store.exists(&CandidateId("a-2".to_string())).await.expect("exists"));
        // needed 3 - suitable 2 + population 2
        assert_eq!(source.limits(), vec![3, 3]);
    }

    #[tokio::test]
    async fn incomplete_enrichment_is_dropped() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![raw("a-1"), raw("a-2")])]));
        let enricher =
            Arc::new(FakeEnricher { incomplete: vec!["a-1"], ..FakeEnricher::default() });
        let store = Arc::new(InMemoryCandidateStore::new());
        let report = acquisition(source, enricher, store.clone())
            .run("power bank", 1)
            .await
            .expect("acquisition");

        assert_eq!(report.outcome, AcquisitionOutcome::Converged);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.dropped, 1);
        assert!(!store.exists(&CandidateId("a-1".to_string())).await.expect("exists"));
    }

    #[tokio::test]
    async fn known_candidates_are_not_enriched_again() {
        let store = Arc::new(InMemoryCandidateStore::new());
        store
            .insert(Candidate {
                id: CandidateId("a-1".to_string()),
                identifier: None,
                title: "power bank (a-1)".to_string(),
                price: Some(100.0),
                characteristics: Vec::new(),
                suitable: true,
                created_at: Utc::now(),
            })
            .await
            .expect("seed");
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![raw("a-1"), raw("a-2")])]));
        let enricher = Arc::new(FakeEnricher::default());

        let report = acquisition(source, enricher.clone(), store)
            .run("power bank", 2)
            .await
            .expect("acquisition");

        assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.population, 2);
    }

    #[tokio::test]
    async fn unsuitable_results_spend_every_attempt() {
        let batches = (0..MAX_ATTEMPTS).map(|i| Ok(vec![raw(&format!("n-{i}"))])).collect();
        let source = Arc::new(ScriptedSource::new(batches));
        let priceless = vec!["n-0", "n-1", "n-2", "n-3", "n-4"];
        let enricher = Arc::new(FakeEnricher { priceless, ..FakeEnricher::default() });
        let store = Arc::new(InMemoryCandidateStore::new());

        let report = acquisition(source.clone(), enricher, store)
            .run("power bank", 2)
            .await
            .expect("acquisition");

        assert_eq!(report.outcome, AcquisitionOutcome::Exhausted(ExhaustionReason::AttemptsSpent));
        assert_eq!(report.attempts, MAX_ATTEMPTS);
        assert_eq!(report.suitable, 0);
        assert_eq!(source.limits(), vec![2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn source_failure_exhausts_without_error() {
        let source = Arc::new(ScriptedSource::new(vec![Err(UpstreamError::Transport(
            "connection refused".to_string(),
        ))]));
        let report = acquisition(source, Arc::default(), Arc::new(InMemoryCandidateStore::new()))
            .run("power bank", 1)
            .await
            .expect("acquisition");

        assert!(matches!(
            report.outcome,
            AcquisitionOutcome::Exhausted(ExhaustionReason::SourceFailed(_))
        ));
    }

    #[tokio::test]
    async fn pacing_happens_between_enrichment_calls_only() {
        let source =
            Arc::new(ScriptedSource::new(vec![Ok(vec![raw("a-1"), raw("a-2"), raw("a-3")])]));
        let pacer = Arc::new(CountingPacer::default());
        let acquisition = AcquisitionLoop::new(
            source,
            Arc::new(FakeEnricher::default()),
            Arc::new(InMemoryCandidateStore::new()),
            pacer.clone(),
        );

        acquisition.run("power bank", 3).await.expect("acquisition");

        assert_eq!(pacer.pauses.load(Ordering::SeqCst), 2);
    }
}
