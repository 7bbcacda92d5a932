//! Read-only access to the user-scoped historical store.
//!
//! The store itself (database, retention, authentication scoping) belongs
//! to an external collaborator; this crate only issues read queries through
//! the [`HistoryStore`] trait and never mutates anything. Implementations are
//! expected to be pre-scoped to the requesting user.

use async_trait::async_trait;
use thiserror::Error;

use crate::fingerprint::HistoricalScan;
use crate::proximity::{DeviceObservation, OwnLocation};

/// Failure talking to the historical store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Time-range / session filter for history queries.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryFilter {
    /// Inclusive lower bound, seconds since the Unix epoch
    pub from: Option<f64>,
    /// Inclusive upper bound, seconds since the Unix epoch
    pub to: Option<f64>,
    /// Restrict to these sessions; empty means all sessions
    pub session_ids: Vec<String>,
}

impl HistoryFilter {
    /// Whether a timestamped, optionally session-tagged record passes the
    /// filter. Useful for in-memory implementations and tests.
    pub fn matches(&self, timestamp: f64, session_id: Option<&str>) -> bool {
        if self.from.map_or(false, |from| timestamp < from) {
            return false;
        }
        if self.to.map_or(false, |to| timestamp > to) {
            return false;
        }
        if self.session_ids.is_empty() {
            return true;
        }
        session_id.map_or(false, |id| self.session_ids.iter().any(|s| s == id))
    }
}

/// Read-only queries against the requesting user's history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All past access-point scans whose bssid is in `bssids`.
    async fn access_point_scans(&self, bssids: &[String]) -> Result<Vec<HistoricalScan>, StoreError>;

    /// The user's own recorded locations matching `filter`.
    async fn own_locations(&self, filter: &HistoryFilter) -> Result<Vec<OwnLocation>, StoreError>;

    /// Device observations recorded around the user, matching `filter`.
    async fn device_observations(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<DeviceObservation>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_filter_matches_everything() {
        let filter = HistoryFilter::default();
        assert!(filter.matches(0.0, None));
        assert!(filter.matches(1e12, Some("walk")));
    }

    #[test]
    fn test_time_range_bounds_are_inclusive() {
        let filter = HistoryFilter {
            from: Some(100.0),
            to: Some(200.0),
            session_ids: Vec::new(),
        };
        assert!(filter.matches(100.0, None));
        assert!(filter.matches(200.0, None));
        assert!(!filter.matches(99.9, None));
        assert!(!filter.matches(200.1, None));
    }

    #[test]
    fn test_session_filter_requires_a_session() {
        let filter = HistoryFilter {
            from: None,
            to: None,
            session_ids: vec!["walk".to_string()],
        };
        assert!(filter.matches(0.0, Some("walk")));
        assert!(!filter.matches(0.0, Some("run")));
        assert!(!filter.matches(0.0, None));
    }
}
