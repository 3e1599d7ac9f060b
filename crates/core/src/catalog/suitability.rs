//! Population-relative suitability.
//!
//! The required characteristics of a query are the ones most of its cached
//! candidates report. A candidate is suitable when it has a price and reports
//! every required characteristic. Because the required set moves with the
//! population, the flags are recomputed after every batch.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::ports::{CandidateStore, StoreError};
use crate::domain::candidate::{Candidate, CandidateId};

pub const REQUIRED_SHARE: f64 = 0.8;

/// Requirement names whose occurrence count reaches `required_share` of the
/// population size. Every reported characteristic counts, so a name repeated
/// on one candidate counts more than once.
pub fn infer_required(population: &[Candidate], required_share: f64) -> BTreeSet<String> {
    if population.is_empty() {
        return BTreeSet::new();
    }

    let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for candidate in population {
        for characteristic in &candidate.characteristics {
            *frequency.entry(characteristic.requirement.as_str()).or_default() += 1;
        }
    }

    let total = population.len() as f64;
    frequency
        .into_iter()
        .filter(|(_, count)| *count as f64 / total >= required_share)
        .map(|(name, _)| name.to_string())
        .collect()
}

pub fn is_suitable(candidate: &Candidate, required: &BTreeSet<String>) -> bool {
    if candidate.price.is_none() {
        return false;
    }
    let names = candidate.requirement_names();
    required.iter().all(|name| names.contains(name.as_str()))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub required: BTreeSet<String>,
    /// Candidates whose stored flag disagrees with the fresh verdict, already
    /// carrying the new flag.
    pub changed: Vec<Candidate>,
    pub population: usize,
    pub suitable: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReclassifyReport {
    pub required: BTreeSet<String>,
    pub updated: Vec<CandidateId>,
    pub population: usize,
    pub suitable: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuitabilityClassifier {
    required_share: f64,
}

impl Default for SuitabilityClassifier {
    fn default() -> Self {
        Self { required_share: REQUIRED_SHARE }
    }
}

impl SuitabilityClassifier {
    pub fn new(required_share: f64) -> Self {
        Self { required_share }
    }

    pub fn required_share(&self) -> f64 {
        self.required_share
    }

    pub fn classify(&self, population: &[Candidate]) -> Classification {
        let required = infer_required(population, self.required_share);
        let mut changed = Vec::new();
        let mut suitable = 0;

        for candidate in population {
            let verdict = is_suitable(candidate, &required);
            if verdict {
                suitable += 1;
            }
            if candidate.suitable != verdict {
                let mut updated = candidate.clone();
                updated.suitable = verdict;
                changed.push(updated);
            }
        }

        Classification { required, changed, population: population.len(), suitable }
    }

    /// Classifies the whole population and writes back only the flags that
    /// changed. Running it twice over the same population writes nothing the
    /// second time.
    pub async fn reclassify(
        &self,
        store: &dyn CandidateStore,
        population: &[Candidate],
    ) -> Result<ReclassifyReport, StoreError> {
        let classification = self.classify(population);
        debug!(
            event_name = "catalog.suitability.required",
            required = ?classification.required,
            population = classification.population,
            "inferred required characteristics"
        );

        let mut updated = Vec::with_capacity(classification.changed.len());
        for candidate in &classification.changed {
            store.update(candidate).await?;
            info!(
                event_name = "catalog.suitability.changed",
                candidate_id = %candidate.id,
                suitable = candidate.suitable,
                "candidate suitability changed"
            );
            updated.push(candidate.id.clone());
        }

        Ok(ReclassifyReport {
            required: classification.required,
            updated,
            population: classification.population,
            suitable: classification.suitable,
        })
    }
}
