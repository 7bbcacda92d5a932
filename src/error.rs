//! Error taxonomy for the fusion pipeline.
//!
//! Window-level upstream failures are deliberately absent here: the
//! orchestrator recovers from them (log, skip, continue) and only a fully
//! empty merge surfaces as [`FusionError::NoMatch`]. See
//! [`crate::matcher::WindowError`] for the per-window failure type.

use thiserror::Error;

/// Result type for fusion operations
pub type FusionResult<T> = Result<T, FusionError>;

/// Errors surfaced by the fusion components.
#[derive(Debug, Error)]
pub enum FusionError {
    /// Malformed or insufficient caller input
    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),

    /// No map-match window produced any geometry
    #[error("no map-match result for any window")]
    NoMatch,

    /// None of the observed access points has historical sightings
    #[error("no historical data for the observed access points")]
    NoHistoricalData,

    /// No observed access point overlaps a derived fingerprint
    #[error("no observed access point matches a known fingerprint")]
    NoOverlap,

    /// The historical store failed to answer
    #[error("history store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl FusionError {
    /// Stable HTTP status for the consumption surface.
    pub fn http_status(&self) -> u16 {
        match self {
            FusionError::InsufficientData(_) => 400,
            FusionError::NoMatch | FusionError::NoHistoricalData | FusionError::NoOverlap => 404,
            FusionError::Store(_) => 500,
        }
    }

    /// Stable machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            FusionError::InsufficientData(_) => "bad_request",
            FusionError::NoMatch | FusionError::NoHistoricalData | FusionError::NoOverlap => {
                "not_found"
            }
            FusionError::Store(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(FusionError::InsufficientData("x").http_status(), 400);
        assert_eq!(FusionError::NoMatch.http_status(), 404);
        assert_eq!(FusionError::NoHistoricalData.http_status(), 404);
        assert_eq!(FusionError::NoOverlap.http_status(), 404);
        assert_eq!(FusionError::Store(StoreError("down".into())).http_status(), 500);
    }

    #[test]
    fn test_code_mapping() {
        assert_eq!(FusionError::InsufficientData("x").code(), "bad_request");
        assert_eq!(FusionError::NoOverlap.code(), "not_found");
        assert_eq!(FusionError::Store(StoreError("down".into())).code(), "internal");
    }
}
