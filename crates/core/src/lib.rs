pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ranking;

pub use catalog::{
    AcquisitionLoop, AcquisitionOutcome, AcquisitionReport, CandidateQuery, CandidateStore,
    InMemoryCandidateStore, Listing, ListingRequest, ListingService, ProductEnricher,
    ProductSource, StoreError, SuitabilityClassifier, UpstreamError,
};
pub use domain::candidate::{
    Candidate, CandidateId, Characteristic, CharacteristicValue, Enrichment, RawCandidate,
};
pub use errors::{ApplicationError, InterfaceError, RankingError};
pub use ranking::{
    decode_ranking_items, rank_items, Mode, RankedItem, RankingItem, SelectedCharacteristic,
};
