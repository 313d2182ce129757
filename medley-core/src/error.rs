//! Error types for MEDLEY operations

use crate::change::EntityKind;
use thiserror::Error;

/// Cache key encoding errors.
///
/// The parameter union is closed, so cycles are impossible; what remains
/// is pathological nesting and malformed namespaces. Callers must never
/// cache on this path - they compute directly instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Parameter nesting exceeds {max} levels")]
    TooDeep { max: usize },

    #[error("Invalid cache namespace: {namespace:?}")]
    BadNamespace { namespace: String },
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache value codec failed for key {key}: {reason}")]
    Codec { key: String, reason: String },
}

/// Relational store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("Row not found: {entity:?} with id {id}")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("Relational store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Aggregate computation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("Aggregate computation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Aggregate computation failed: {reason}")]
    Failed { reason: String },
}

/// Master error type for all MEDLEY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MedleyError {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
}

/// Result type alias for MEDLEY operations.
pub type MedleyResult<T> = Result<T, MedleyError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_display() {
        let err = EncodeError::TooDeep { max: 16 };
        assert!(format!("{}", err).contains("16"));

        let err = EncodeError::BadNamespace {
            namespace: "best times".to_string(),
        };
        assert!(format!("{}", err).contains("best times"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("unavailable"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_data_error_display() {
        let err = DataError::NotFound {
            entity: EntityKind::TimeEntry,
            id: 9,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("TimeEntry"));
        assert!(msg.contains("9"));
    }

    #[test]
    fn test_medley_error_from_variants() {
        let encode = MedleyError::from(EncodeError::TooDeep { max: 16 });
        assert!(matches!(encode, MedleyError::Encode(_)));

        let store = MedleyError::from(StoreError::Unavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(store, MedleyError::Store(_)));

        let data = MedleyError::from(DataError::Unavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(data, MedleyError::Data(_)));

        let compute = MedleyError::from(ComputeError::Timeout { elapsed_ms: 250 });
        assert!(matches!(compute, MedleyError::Compute(_)));
    }
}
