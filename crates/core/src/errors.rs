use thiserror::Error;

use crate::catalog::ports::{StoreError, UpstreamError};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RankingError {
    #[error("criterion matrix must contain at least one row and one column")]
    EmptyMatrix,
    #[error("criterion matrix row {row} has {actual} values, expected {expected}")]
    RaggedMatrix { row: usize, expected: usize, actual: usize },
    #[error("criterion value at row {row}, column {column} is not a finite number")]
    NonFinite { row: usize, column: usize },
    #[error("{what} has length {actual}, expected {expected} (one per criterion column)")]
    ShapeMismatch { what: &'static str, expected: usize, actual: usize },
    #[error("invalid optimization mode `{0}` (expected max|min)")]
    InvalidMode(String),
    #[error("criterion weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },
    #[error("criterion weight at column {column} is negative ({weight})")]
    NegativeWeight { column: usize, weight: f64 },
    #[error("every criterion is non-discriminating; no weight signal is available")]
    DegenerateInput,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Ranking(#[from] RankingError),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<UpstreamError> for ApplicationError {
    fn from(value: UpstreamError) -> Self {
        Self::UpstreamUnavailable(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Validation(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Ranking(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::UpstreamUnavailable(message)
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::ports::StoreError;
    use crate::errors::{ApplicationError, InterfaceError, RankingError};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::Validation("query must not be empty".to_owned())
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn ranking_error_keeps_its_message_as_bad_request() {
        let interface =
            ApplicationError::from(RankingError::WeightSum { sum: 0.9 }).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert!(interface.message().contains("sum to 1.0"));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn store_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::from(StoreError::Backend("database is locked".to_owned()))
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("missing upstream url".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
