//! Trace cleaning: dwell collapsing and speed-gate filtering.
//!
//! Raw device uploads are noisy in two characteristic ways: long stationary
//! periods produce hundreds of near-identical samples, and GPS glitches
//! produce jumps no vehicle could make. Cleaning sorts the samples by time,
//! collapses sustained dwells to their entry and exit points, then drops any
//! point whose implied speed from the last accepted point is implausible.

use log::debug;

use crate::error::{FusionError, FusionResult};
use crate::geo_utils::haversine_distance;
use crate::{GeoPoint, RawSample};

/// Configuration for trace cleaning.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CleanConfig {
    /// Radius around the running cluster centroid within which a point still
    /// belongs to the dwell (meters). Default: 20.0
    pub dwell_radius_meters: f64,

    /// Minimum time span for a cluster to count as a dwell (seconds).
    /// Default: 90.0
    pub min_dwell_seconds: f64,

    /// Minimum number of points for a cluster to count as a dwell.
    /// Default: 5
    pub min_dwell_points: usize,

    /// Internal movement beyond this distance from the centroid keeps a mid
    /// point in the collapsed output (meters). Default: 10.0
    pub movement_within_dwell_meters: f64,

    /// Maximum plausible travel speed (km/h). Default: 250.0
    pub max_speed_kmh: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            dwell_radius_meters: 20.0,
            min_dwell_seconds: 90.0,
            min_dwell_points: 5,
            movement_within_dwell_meters: 10.0,
            max_speed_kmh: 250.0,
        }
    }
}

/// A denoised trace. Timestamps strictly increase and the implied speed
/// between adjacent points never exceeds the configured maximum.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CleanedTrace {
    pub points: Vec<RawSample>,
}

impl CleanedTrace {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Clean a raw set of samples into a [`CleanedTrace`].
///
/// Steps, in order: sort ascending by timestamp, collapse dwell clusters,
/// speed-gate the result. Invalid samples (bad coordinates or timestamp) are
/// dropped and terminate any dwell cluster in progress.
///
/// Returns [`FusionError::InsufficientData`] when fewer than 2 points are
/// supplied or fewer than 2 survive cleaning.
///
/// # Example
/// ```
/// use trace_fusion::{clean_trace, CleanConfig, RawSample};
///
/// let samples = vec![
///     RawSample::new(51.5074, -0.1278, 0.0),
///     RawSample::new(51.5090, -0.1300, 60.0),
/// ];
/// let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
/// assert_eq!(trace.len(), 2);
/// ```
pub fn clean_trace(mut samples: Vec<RawSample>, config: &CleanConfig) -> FusionResult<CleanedTrace> {
    if samples.len() < 2 {
        return Err(FusionError::InsufficientData("need at least 2 raw samples"));
    }

    // total_cmp keeps the sort well defined even for NaN timestamps, which
    // are dropped as invalid further down
    samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let raw_count = samples.len();
    let reduced = collapse_dwells(&samples, config);
    let gated = speed_gate(&reduced, config);

    debug!(
        "cleaned trace: {} raw, {} after dwell collapse, {} after speed gate",
        raw_count,
        reduced.len(),
        gated.len()
    );

    if gated.len() < 2 {
        return Err(FusionError::InsufficientData(
            "fewer than 2 points survived cleaning",
        ));
    }

    Ok(CleanedTrace { points: gated })
}

/// A run of consecutive samples staying within the dwell radius of their
/// running centroid.
struct DwellCluster {
    points: Vec<RawSample>,
    centroid: GeoPoint,
}

impl DwellCluster {
    fn new(seed: RawSample) -> Self {
        Self {
            centroid: seed.position(),
            points: vec![seed],
        }
    }

    fn accepts(&self, sample: &RawSample, radius_meters: f64) -> bool {
        haversine_distance(&self.centroid, &sample.position()) <= radius_meters
    }

    fn push(&mut self, sample: RawSample) {
        self.points.push(sample);
        // incremental running mean
        let n = self.points.len() as f64;
        self.centroid.latitude += (sample.latitude - self.centroid.latitude) / n;
        self.centroid.longitude += (sample.longitude - self.centroid.longitude) / n;
    }

    /// Emit the cluster into `out`. A sustained dwell collapses to
    /// `[first, last]`, or `[first, mid, last]` when an interior point moved
    /// beyond the movement threshold (mid = the farthest such point).
    /// Short or sparse clusters are kept verbatim.
    fn flush_into(self, out: &mut Vec<RawSample>, config: &CleanConfig) {
        let first = self.points[0];
        let last = *self.points.last().expect("cluster is never empty");
        let span_seconds = last.timestamp - first.timestamp;

        let is_dwell =
            span_seconds >= config.min_dwell_seconds && self.points.len() >= config.min_dwell_points;
        if !is_dwell {
            out.extend(self.points);
            return;
        }

        let mut mid: Option<(RawSample, f64)> = None;
        let interior = if self.points.len() > 2 {
            &self.points[1..self.points.len() - 1]
        } else {
            &[]
        };
        for point in interior {
            let meters = haversine_distance(&self.centroid, &point.position());
            if meters > config.movement_within_dwell_meters
                && mid.map_or(true, |(_, best)| meters > best)
            {
                mid = Some((*point, meters));
            }
        }

        out.push(first);
        if let Some((point, _)) = mid {
            out.push(point);
        }
        out.push(last);
    }
}

fn collapse_dwells(samples: &[RawSample], config: &CleanConfig) -> Vec<RawSample> {
    let mut out = Vec::with_capacity(samples.len());
    let mut cluster: Option<DwellCluster> = None;

    for sample in samples {
        if !sample.is_valid() {
            // invalid samples are dropped and terminate the cluster
            if let Some(current) = cluster.take() {
                current.flush_into(&mut out, config);
            }
            continue;
        }

        match cluster.take() {
            Some(mut current) if current.accepts(sample, config.dwell_radius_meters) => {
                current.push(*sample);
                cluster = Some(current);
            }
            Some(current) => {
                current.flush_into(&mut out, config);
                cluster = Some(DwellCluster::new(*sample));
            }
            None => cluster = Some(DwellCluster::new(*sample)),
        }
    }

    if let Some(current) = cluster.take() {
        current.flush_into(&mut out, config);
    }

    out
}

/// Keep only points reachable from the last accepted point at a plausible
/// speed. Non-positive elapsed time also drops the candidate, which is what
/// enforces strictly increasing timestamps in the output.
fn speed_gate(points: &[RawSample], config: &CleanConfig) -> Vec<RawSample> {
    let mut accepted: Vec<RawSample> = Vec::with_capacity(points.len());

    for point in points {
        if let Some(previous) = accepted.last() {
            let elapsed_seconds = point.timestamp - previous.timestamp;
            if elapsed_seconds <= 0.0 {
                continue;
            }
            let meters = haversine_distance(&previous.position(), &point.position());
            let speed_kmh = meters / elapsed_seconds * 3.6;
            if speed_kmh > config.max_speed_kmh {
                continue;
            }
        }
        accepted.push(*point);
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latitude: f64, longitude: f64, timestamp: f64) -> RawSample {
        RawSample::new(latitude, longitude, timestamp)
    }

    // ~1 meter of latitude in degrees
    const LAT_METER: f64 = 1.0 / 111_320.0;

    #[test]
    fn test_too_few_samples() {
        let result = clean_trace(vec![sample(51.5, -0.1, 0.0)], &CleanConfig::default());
        assert!(matches!(result, Err(FusionError::InsufficientData(_))));
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let samples = vec![
            sample(51.52, -0.12, 120.0),
            sample(51.50, -0.10, 0.0),
            sample(51.51, -0.11, 60.0),
        ];
        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        assert_eq!(trace.points[0].timestamp, 0.0);
        assert_eq!(trace.points[2].timestamp, 120.0);
    }

    #[test]
    fn test_dwell_collapses_to_entry_and_exit() {
        // 10 points within a ~5m radius spanning 117 seconds
        let samples: Vec<RawSample> = (0..10)
            .map(|i| sample(51.5 + (i % 2) as f64 * 2.0 * LAT_METER, -0.1, i as f64 * 13.0))
            .collect();

        let trace = clean_trace(samples.clone(), &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.points[0], samples[0]);
        assert_eq!(trace.points[1], samples[9]);
    }

    #[test]
    fn test_dwell_keeps_mid_point_on_internal_movement() {
        // same dwell, but one interior point sits ~15m from the centroid
        let mut samples: Vec<RawSample> = (0..10)
            .map(|i| sample(51.5, -0.1, i as f64 * 13.0))
            .collect();
        samples[5].latitude += 15.0 * LAT_METER;

        let trace = clean_trace(samples.clone(), &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.points[0], samples[0]);
        assert_eq!(trace.points[1], samples[5]);
        assert_eq!(trace.points[2], samples[9]);
    }

    #[test]
    fn test_short_cluster_kept_verbatim() {
        // only 4 points: below min_dwell_points, kept as-is
        let samples: Vec<RawSample> = (0..4)
            .map(|i| sample(51.5, -0.1, i as f64 * 40.0))
            .collect();
        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 4);
    }

    #[test]
    fn test_brief_cluster_kept_verbatim() {
        // 6 points but only 50 seconds: below min_dwell_seconds, kept as-is
        let samples: Vec<RawSample> = (0..6)
            .map(|i| sample(51.5, -0.1, i as f64 * 10.0))
            .collect();
        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 6);
    }

    #[test]
    fn test_speed_gate_drops_implausible_jump() {
        // a walkable pair followed by a ~500km jump in 10 seconds
        let samples = vec![
            sample(51.50, -0.10, 0.0),
            sample(51.51, -0.11, 600.0),
            sample(56.0, -4.0, 610.0),
        ];
        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.points[1].latitude, 51.51);
    }

    #[test]
    fn test_speed_gate_drops_non_positive_elapsed() {
        let samples = vec![
            sample(51.50, -0.10, 0.0),
            sample(51.51, -0.11, 0.0),
            sample(51.52, -0.12, 600.0),
        ];
        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 2);
        // duplicate-timestamp point was dropped
        assert_eq!(trace.points[1].timestamp, 600.0);
    }

    #[test]
    fn test_cleaned_trace_invariants() {
        let config = CleanConfig::default();
        let samples: Vec<RawSample> = (0..50)
            .map(|i| sample(51.5 + i as f64 * 0.0005, -0.1 + i as f64 * 0.0003, i as f64 * 20.0))
            .collect();

        let trace = clean_trace(samples, &config).unwrap();
        for pair in trace.points.windows(2) {
            let elapsed = pair[1].timestamp - pair[0].timestamp;
            assert!(elapsed > 0.0);
            let meters = haversine_distance(&pair[0].position(), &pair[1].position());
            assert!(meters / elapsed * 3.6 <= config.max_speed_kmh);
        }
    }

    #[test]
    fn test_invalid_sample_forces_flush() {
        // a dwell-eligible cluster interrupted by an invalid sample
        let mut samples: Vec<RawSample> = (0..6)
            .map(|i| sample(51.5, -0.1, i as f64 * 20.0))
            .collect();
        samples.push(sample(f64::NAN, -0.1, 120.0));
        samples.push(sample(51.6, -0.2, 4000.0));
        samples.push(sample(51.7, -0.3, 8000.0));

        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        // cluster of 6 spanning 100s collapses to 2, invalid point vanishes,
        // the two distant points pass the gate
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.points[0].timestamp, 0.0);
        assert_eq!(trace.points[1].timestamp, 100.0);
        assert_eq!(trace.points[2].latitude, 51.6);
        assert_eq!(trace.points[3].latitude, 51.7);
    }

    #[test]
    fn test_dwell_then_glitch_end_to_end() {
        // 11 co-located points 10s apart, then a jump no vehicle could make
        let mut samples: Vec<RawSample> = (0..11)
            .map(|i| sample(0.0, 0.0, i as f64 * 10.0))
            .collect();
        samples.push(sample(5.0, 5.0, 110.0));

        let trace = clean_trace(samples, &CleanConfig::default()).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.points[0].timestamp, 0.0);
        assert_eq!(trace.points[1].timestamp, 100.0);
        assert_eq!(trace.points[1].latitude, 0.0);
    }

    #[test]
    fn test_all_invalid_is_insufficient() {
        let samples = vec![
            sample(f64::NAN, 0.0, 0.0),
            sample(0.0, f64::NAN, 10.0),
            sample(0.0, 0.0, f64::NAN),
        ];
        let result = clean_trace(samples, &CleanConfig::default());
        assert!(matches!(result, Err(FusionError::InsufficientData(_))));
    }
}
