use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value reported for a single requirement. Upstream catalogs mix numbers,
/// booleans and free text, so the variant is decided at decode time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub requirement: String,
    pub value: Option<CharacteristicValue>,
    pub unit: Option<String>,
}

/// A product held in the local cache.
///
/// `suitable` is population-relative: it is only meaningful together with the
/// other candidates matching the same query and is rewritten by the
/// suitability classifier whenever that population changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub identifier: Option<String>,
    pub title: String,
    pub price: Option<f64>,
    pub characteristics: Vec<Characteristic>,
    pub suitable: bool,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn requirement_names(&self) -> BTreeSet<&str> {
        self.characteristics.iter().map(|ch| ch.requirement.as_str()).collect()
    }
}

/// Candidate as returned by the external source, before enrichment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub id: CandidateId,
    pub identifier: Option<String>,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub characteristics: Vec<Characteristic>,
    pub price: Option<f64>,
}

impl RawCandidate {
    /// Combines the raw listing with its enrichment. New candidates start as
    /// suitable until the classifier has seen the population they joined.
    pub fn into_candidate(self, enrichment: Enrichment, created_at: DateTime<Utc>) -> Candidate {
        Candidate {
            id: self.id,
            identifier: self.identifier,
            title: self.title,
            price: enrichment.price,
            characteristics: enrichment.characteristics,
            suitable: true,
            created_at,
        }
    }
}
