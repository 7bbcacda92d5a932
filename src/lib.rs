//! # Trace Fusion
//!
//! Geospatial signal fusion for a location-tracking service: turns noisy raw
//! location and radio samples into usable trajectories and position estimates.
//!
//! This library provides:
//! - GPS trace cleaning (dwell collapsing and speed gating)
//! - Windowed map matching against an external routing service
//! - Wi-Fi fingerprint positioning from historical access-point sightings
//! - Nearest-in-time proximity aggregation for device observations
//!
//! ## Features
//!
//! - **`parallel`** - Parallel proximity aggregation with rayon
//! - **`http`** - OSRM-style client for the external map-matching service
//! - **`server`** - JSON API exposing the pipeline over axum
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trace_fusion::{clean_trace, CleanConfig, RawSample};
//!
//! let samples = vec![
//!     RawSample::new(51.5074, -0.1278, 0.0),
//!     RawSample::new(51.5080, -0.1290, 30.0),
//!     RawSample::new(51.5090, -0.1300, 60.0),
//! ];
//!
//! let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
//! assert_eq!(trace.points.len(), 3);
//! ```

pub mod cleaner;
pub mod error;
pub mod fingerprint;
pub mod geo_utils;
pub mod matcher;
pub mod proximity;
pub mod store;

// HTTP client for the external map-matching service
#[cfg(feature = "http")]
pub mod http;

// JSON API exposing the pipeline
#[cfg(feature = "server")]
pub mod server;

pub use cleaner::{clean_trace, CleanConfig, CleanedTrace};
pub use error::{FusionError, FusionResult};
pub use fingerprint::{
    derive_fingerprints, locate, AccessPointObservation, Fingerprint, HistoricalScan,
    LocateConfig, PositionEstimate, UsedAccessPoint,
};
pub use matcher::{
    match_trace, MatchClient, MatchConfig, MatchedGeometry, MatchedWindow, WindowError,
};
pub use proximity::{
    aggregate_proximity, DeviceKind, DeviceObservation, DistanceAggregate, OwnLocation,
};
pub use store::{HistoryFilter, HistoryStore, StoreError};

#[cfg(feature = "http")]
pub use http::OsrmMatchClient;

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trace_fusion::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A raw timestamped location sample uploaded by a client device.
///
/// `timestamp` is seconds since the Unix epoch. Millisecond epochs are not
/// accepted anywhere in this crate; callers convert at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
}

impl RawSample {
    /// Create a new sample.
    pub fn new(latitude: f64, longitude: f64, timestamp: f64) -> Self {
        Self { latitude, longitude, timestamp }
    }

    /// The sample's coordinate, without the timestamp.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Check that coordinates are plausible and the timestamp is a real
    /// epoch-seconds value.
    pub fn is_valid(&self) -> bool {
        self.position().is_valid() && self.timestamp.is_finite() && self.timestamp >= 0.0
    }
}

/// Tunable constants for every pipeline component, injected rather than
/// scattered as module literals.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionConfig {
    pub clean: CleanConfig,
    pub matching: MatchConfig,
    pub locate: LocateConfig,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_raw_sample_validation() {
        assert!(RawSample::new(51.5074, -0.1278, 1_700_000_000.0).is_valid());
        assert!(!RawSample::new(51.5074, -0.1278, f64::NAN).is_valid());
        assert!(!RawSample::new(51.5074, -0.1278, -1.0).is_valid());
        assert!(!RawSample::new(f64::NAN, -0.1278, 0.0).is_valid());
    }

    #[test]
    fn test_fusion_config_defaults() {
        let config = FusionConfig::default();
        assert_eq!(config.clean.dwell_radius_meters, 20.0);
        assert_eq!(config.matching.max_points_per_window, 90);
        assert_eq!(config.locate.weight_floor, 1e-6);
    }
}
