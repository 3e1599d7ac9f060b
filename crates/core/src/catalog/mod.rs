//! Candidate acquisition engine: ports, suitability, the bounded acquisition
//! loop and the listing entrypoint built on top of it.

pub mod acquisition;
pub mod listing;
pub mod memory;
pub mod ports;
pub mod pricing;
pub mod suitability;

pub use acquisition::{
    next_transition, AcquisitionLoop, AcquisitionOutcome, AcquisitionReport, AcquisitionState,
    ExhaustionReason, Transition, MAX_ATTEMPTS,
};
pub use listing::{
    ListedCandidate, Listing, ListingRequest, ListingService, QueryGuard, QueryLocks,
    DEFAULT_LISTING_LIMIT,
};
pub use memory::InMemoryCandidateStore;
pub use ports::{
    CandidateQuery, CandidateStore, NoPacer, Pacer, ProductEnricher, ProductSource, RandomPacer,
    StoreError, UpstreamError,
};
pub use pricing::trend_price;
pub use suitability::{
    infer_required, is_suitable, Classification, ReclassifyReport, SuitabilityClassifier,
    REQUIRED_SHARE,
};
