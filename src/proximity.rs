//! Nearest-in-time proximity aggregation.
//!
//! Correlates device sightings (Wi-Fi or BLE identifiers seen around the
//! user) against the user's own recorded trajectory: each sighting is paired
//! with the own-location closest in time (no interpolation) and the
//! distances fold into per-device statistics. Consumed by anti-stalking
//! analytics.

use std::collections::HashMap;

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geo_utils::haversine_distance;
use crate::GeoPoint;

/// Radio technology a device was sighted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum DeviceKind {
    Wifi,
    Ble,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Wifi => "wifi",
            DeviceKind::Ble => "ble",
        }
    }
}

/// One of the user's own recorded locations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub session_id: Option<String>,
}

impl OwnLocation {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// A spatiotemporal sighting of some other device near the user.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceObservation {
    pub kind: DeviceKind,
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub session_id: Option<String>,
}

impl DeviceObservation {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Distance statistics for one device across all its sightings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceAggregate {
    pub kind: DeviceKind,
    pub identifier: String,
    pub count: u32,
    pub min_meters: f64,
    pub max_meters: f64,
    pub avg_meters: f64,
}

impl DistanceAggregate {
    /// Stable key, `kind:identifier`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.identifier)
    }
}

/// Running per-device fold state. min/max/sum are commutative, so the fold is
/// order-independent.
struct Accumulator {
    count: u32,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, meters: f64) {
        self.count += 1;
        self.sum += meters;
        self.min = self.min.min(meters);
        self.max = self.max.max(meters);
    }
}

/// Correlate device observations against the user's own trajectory and fold
/// the distances into per-device aggregates, sorted by key.
///
/// Observations whose session bucket is missing or empty are skipped; no
/// distance can be computed for them.
pub fn aggregate_proximity(
    locations: &[OwnLocation],
    observations: &[DeviceObservation],
) -> Vec<DistanceAggregate> {
    // bucket own locations per session, each sorted by time
    let mut buckets: HashMap<Option<&str>, Vec<&OwnLocation>> = HashMap::new();
    for location in locations {
        buckets
            .entry(location.session_id.as_deref())
            .or_default()
            .push(location);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }

    // per-observation distance against the nearest-in-time own location
    #[cfg(feature = "parallel")]
    let distances: Vec<(DeviceKind, &str, f64)> = observations
        .par_iter()
        .filter_map(|observation| distance_for(observation, &buckets))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let distances: Vec<(DeviceKind, &str, f64)> = observations
        .iter()
        .filter_map(|observation| distance_for(observation, &buckets))
        .collect();

    let mut grouped: HashMap<(DeviceKind, &str), Accumulator> = HashMap::new();
    for (kind, identifier, meters) in distances {
        grouped
            .entry((kind, identifier))
            .or_insert_with(Accumulator::new)
            .add(meters);
    }

    debug!(
        "aggregated {} observation(s) into {} device summary(ies)",
        observations.len(),
        grouped.len()
    );

    let mut aggregates: Vec<DistanceAggregate> = grouped
        .into_iter()
        .map(|((kind, identifier), acc)| DistanceAggregate {
            kind,
            identifier: identifier.to_string(),
            count: acc.count,
            min_meters: acc.min,
            max_meters: acc.max,
            avg_meters: acc.sum / acc.count as f64,
        })
        .collect();
    aggregates.sort_by(|a, b| a.key().cmp(&b.key()));
    aggregates
}

fn distance_for<'a>(
    observation: &'a DeviceObservation,
    buckets: &HashMap<Option<&str>, Vec<&OwnLocation>>,
) -> Option<(DeviceKind, &'a str, f64)> {
    let bucket = buckets.get(&observation.session_id.as_deref())?;
    let nearest = nearest_in_time(bucket, observation.timestamp)?;
    let meters = haversine_distance(&observation.position(), &nearest.position());
    Some((observation.kind, observation.identifier.as_str(), meters))
}

/// Linear scan for the minimal absolute timestamp difference; ties resolve to
/// the first-encountered minimum.
fn nearest_in_time<'a>(bucket: &[&'a OwnLocation], timestamp: f64) -> Option<&'a OwnLocation> {
    let mut best: Option<(&'a OwnLocation, f64)> = None;
    for location in bucket {
        let delta = (location.timestamp - timestamp).abs();
        match best {
            Some((_, smallest)) if delta >= smallest => {}
            _ => best = Some((location, delta)),
        }
    }
    best.map(|(location, _)| location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(latitude: f64, longitude: f64, timestamp: f64) -> OwnLocation {
        OwnLocation {
            latitude,
            longitude,
            timestamp,
            session_id: None,
        }
    }

    fn sighting(identifier: &str, latitude: f64, longitude: f64, timestamp: f64) -> DeviceObservation {
        DeviceObservation {
            kind: DeviceKind::Wifi,
            identifier: identifier.to_string(),
            latitude,
            longitude,
            timestamp,
            session_id: None,
        }
    }

    #[test]
    fn test_nearest_in_time_is_not_interpolated() {
        let locations = vec![location(0.0, 0.0, 0.0), location(1.0, 1.0, 100.0)];
        let observations = vec![sighting("aa:aa", 0.4, 0.4, 40.0)];

        let aggregates = aggregate_proximity(&locations, &observations);
        assert_eq!(aggregates.len(), 1);

        // t=40 is closer to t=0, so the distance is measured from (0, 0)
        let expected = haversine_distance(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.4, 0.4));
        assert!((aggregates[0].avg_meters - expected).abs() < 1e-6);
        assert!(expected > 60_000.0 && expected < 66_000.0);
    }

    #[test]
    fn test_tie_resolves_to_first_encountered() {
        // t=40 is equidistant from t=0 and t=80; the earlier bucket entry wins
        let locations = vec![location(0.0, 0.0, 0.0), location(1.0, 1.0, 80.0)];
        let observations = vec![sighting("aa:aa", 0.0, 0.0, 40.0)];

        let aggregates = aggregate_proximity(&locations, &observations);
        assert!(aggregates[0].avg_meters < 1.0);
    }

    #[test]
    fn test_aggregate_bounds_hold() {
        let locations = vec![location(0.0, 0.0, 0.0)];
        let observations = vec![
            sighting("aa:aa", 0.001, 0.0, 1.0),
            sighting("aa:aa", 0.002, 0.0, 2.0),
            sighting("aa:aa", 0.003, 0.0, 3.0),
        ];

        let aggregates = aggregate_proximity(&locations, &observations);
        assert_eq!(aggregates.len(), 1);
        let device = &aggregates[0];
        assert_eq!(device.count, 3);
        assert!(device.min_meters <= device.avg_meters);
        assert!(device.avg_meters <= device.max_meters);
        assert!(device.min_meters > 0.0);
    }

    #[test]
    fn test_devices_keyed_by_kind_and_identifier() {
        let locations = vec![location(0.0, 0.0, 0.0)];
        let mut ble = sighting("aa:aa", 0.001, 0.0, 1.0);
        ble.kind = DeviceKind::Ble;
        let observations = vec![sighting("aa:aa", 0.001, 0.0, 1.0), ble];

        let aggregates = aggregate_proximity(&locations, &observations);
        assert_eq!(aggregates.len(), 2);
        // sorted by key: "ble:aa:aa" before "wifi:aa:aa"
        assert_eq!(aggregates[0].key(), "ble:aa:aa");
        assert_eq!(aggregates[1].key(), "wifi:aa:aa");
    }

    #[test]
    fn test_session_scoped_matching() {
        let mut walk = location(0.0, 0.0, 10.0);
        walk.session_id = Some("walk".to_string());
        let mut run = location(1.0, 1.0, 10.0);
        run.session_id = Some("run".to_string());
        let locations = vec![walk, run];

        let mut observation = sighting("aa:aa", 1.0, 1.0, 12.0);
        observation.session_id = Some("run".to_string());

        let aggregates = aggregate_proximity(&locations, &[observation]);
        assert_eq!(aggregates.len(), 1);
        // matched against the "run" bucket at (1, 1), not the "walk" one
        assert!(aggregates[0].avg_meters < 1.0);
    }

    #[test]
    fn test_missing_bucket_skips_observation() {
        let locations = vec![location(0.0, 0.0, 0.0)];
        let mut observation = sighting("aa:aa", 0.0, 0.0, 1.0);
        observation.session_id = Some("unknown".to_string());

        let aggregates = aggregate_proximity(&locations, &[observation]);
        assert!(aggregates.is_empty());
    }

    #[test]
    fn test_no_locations_no_aggregates() {
        let observations = vec![sighting("aa:aa", 0.0, 0.0, 1.0)];
        assert!(aggregate_proximity(&[], &observations).is_empty());
    }
}
