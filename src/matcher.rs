//! Map-match orchestration: windowed delegation and result stitching.
//!
//! The external matching service accepts a bounded number of points per call,
//! so long traces are sliced into overlapping windows. Windows are delegated
//! **sequentially**: this bounds simultaneous load on the service and makes
//! merge order trivial (append in call order, no reconciliation needed).
//!
//! A failed or malformed window is logged and skipped; only an entirely empty
//! merge becomes an error. Cancellation is request-scoped: dropping the
//! returned future aborts the in-flight call and discards partial results.

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;

use crate::cleaner::CleanedTrace;
use crate::error::{FusionError, FusionResult};
use crate::geo_utils::linestring_length;
use crate::RawSample;

/// Configuration for map-match orchestration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchConfig {
    /// Maximum points delegated in a single upstream call. Default: 90
    pub max_points_per_window: usize,

    /// Points shared between consecutive windows, preserving continuity of
    /// the stitched geometry. Default: 2
    pub overlap_points: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_points_per_window: 90,
            overlap_points: 2,
        }
    }
}

/// Snapped result for a single delegated window.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedWindow {
    /// Snapped coordinates as `(longitude, latitude)` pairs
    pub coordinates: Vec<[f64; 2]>,
    /// Upstream confidence for this window, in `[0, 1]`
    pub confidence: Option<f64>,
}

/// The stitched geometry for a whole trace.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedGeometry {
    /// Snapped coordinates as `(longitude, latitude)` pairs; no two
    /// consecutive entries are identical
    pub coordinates: Vec<[f64; 2]>,
    /// Arithmetic mean of the per-window confidences, `None` when no window
    /// reported one
    pub confidence: Option<f64>,
}

/// A window-level failure. The orchestrator recovers from these by skipping
/// the window; they never abort the whole operation.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("upstream produced no matching for the window")]
    Empty,
}

/// Narrow client interface to the external map-matching service.
///
/// Implementations receive one window of cleaned samples and return the
/// snapped geometry with a confidence. Keeping the interface this small lets
/// the orchestrator be tested with a fake, and leaves room for retry or
/// timeout policy to be added in the client without touching orchestration.
#[async_trait]
pub trait MatchClient: Send + Sync {
    async fn match_window(&self, points: &[RawSample]) -> Result<MatchedWindow, WindowError>;
}

/// Stitching state folded over successive window results.
#[derive(Debug, Clone, Default)]
struct MergeState {
    coordinates: Vec<[f64; 2]>,
    confidence_sum: f64,
    confidence_count: u32,
}

impl MergeState {
    /// Absorb one successful window: append every coordinate unless it equals
    /// the immediately preceding merged coordinate, and fold the window
    /// confidence into the running sum/count.
    fn absorb(mut self, window: MatchedWindow) -> Self {
        for coordinate in window.coordinates {
            if self.coordinates.last() != Some(&coordinate) {
                self.coordinates.push(coordinate);
            }
        }
        if let Some(confidence) = window.confidence {
            self.confidence_sum += confidence;
            self.confidence_count += 1;
        }
        self
    }

    fn finish(self) -> FusionResult<MatchedGeometry> {
        if self.coordinates.is_empty() {
            return Err(FusionError::NoMatch);
        }
        let confidence = if self.confidence_count > 0 {
            Some(self.confidence_sum / self.confidence_count as f64)
        } else {
            None
        };
        Ok(MatchedGeometry {
            coordinates: self.coordinates,
            confidence,
        })
    }
}

/// Half-open index ranges covering `len` points with the configured window
/// size and overlap.
fn window_ranges(len: usize, config: &MatchConfig) -> Vec<(usize, usize)> {
    let max = config.max_points_per_window;
    if len <= max {
        return vec![(0, len)];
    }

    let stride = max.saturating_sub(config.overlap_points).max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max).min(len);
        ranges.push((start, end));
        if end == len {
            break;
        }
        start += stride;
    }
    ranges
}

/// Match a cleaned trace against the external service, window by window, and
/// stitch the results into one continuous geometry.
///
/// Returns [`FusionError::NoMatch`] when no window contributed any geometry.
pub async fn match_trace<C: MatchClient + ?Sized>(
    client: &C,
    trace: &CleanedTrace,
    config: &MatchConfig,
) -> FusionResult<MatchedGeometry> {
    let ranges = window_ranges(trace.points.len(), config);
    debug!(
        "matching {} points in {} window(s)",
        trace.points.len(),
        ranges.len()
    );

    let mut state = MergeState::default();
    for (index, (start, end)) in ranges.iter().copied().enumerate() {
        match client.match_window(&trace.points[start..end]).await {
            Ok(window) => state = state.absorb(window),
            Err(err) => {
                warn!(
                    "window {}/{} ({}..{}) skipped: {}",
                    index + 1,
                    ranges.len(),
                    start,
                    end,
                    err
                );
            }
        }
    }

    let geometry = state.finish()?;
    debug!(
        "stitched {} coordinates ({:.0}m), confidence {:?}",
        geometry.coordinates.len(),
        linestring_length(&geometry.coordinates),
        geometry.confidence
    );
    Ok(geometry)
}
