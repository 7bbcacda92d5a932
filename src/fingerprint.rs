//! Wi-Fi fingerprint positioning.
//!
//! When GPS is unavailable, the observer's position can still be estimated
//! from the access points currently in view: each bssid the user has seen
//! before has a historical centroid, and the estimate is the RSSI-weighted
//! mean of those centroids. Weaker signals (more negative dBm) contribute
//! exponentially less.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{FusionError, FusionResult};
use crate::geo_utils::compute_center;
use crate::GeoPoint;

/// Configuration for fingerprint positioning.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocateConfig {
    /// Lower bound on an RSSI-derived weight; keeps every weight strictly
    /// positive. Default: 1e-6
    pub weight_floor: f64,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self { weight_floor: 1e-6 }
    }
}

/// A live access-point sighting reported by the client device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessPointObservation {
    pub bssid: String,
    /// Received signal strength in dBm
    pub rssi: f64,
    pub ssid: Option<String>,
}

/// One past sighting of an access point from the historical scan store.
/// Entries without coordinates carry no positional information and are
/// skipped during fingerprint derivation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoricalScan {
    pub bssid: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Historical centroid for one access point, derived on demand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fingerprint {
    pub bssid: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Number of historical sightings behind the centroid
    pub samples: u32,
}

/// An access point that contributed to an estimate, kept for auditability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsedAccessPoint {
    pub bssid: String,
    pub ssid: Option<String>,
    pub rssi: f64,
    pub ap_latitude: f64,
    pub ap_longitude: f64,
    pub weight: f64,
    pub samples: u32,
}

/// A position estimate with the evidence it was built from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionEstimate {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub used_access_points: Vec<UsedAccessPoint>,
}

/// Derive per-bssid fingerprints from historical scans: the arithmetic-mean
/// centroid of every coordinate-bearing sighting, keyed by bssid. Bssids with
/// no qualifying sightings simply do not appear.
pub fn derive_fingerprints(scans: &[HistoricalScan]) -> HashMap<String, Fingerprint> {
    let mut positions: HashMap<&str, Vec<GeoPoint>> = HashMap::new();
    for scan in scans {
        if let (Some(latitude), Some(longitude)) = (scan.latitude, scan.longitude) {
            positions
                .entry(scan.bssid.as_str())
                .or_default()
                .push(GeoPoint::new(latitude, longitude));
        }
    }

    positions
        .into_iter()
        .map(|(bssid, points)| {
            let center = compute_center(&points);
            (
                bssid.to_string(),
                Fingerprint {
                    bssid: bssid.to_string(),
                    latitude: center.latitude,
                    longitude: center.longitude,
                    samples: points.len() as u32,
                },
            )
        })
        .collect()
}

/// RSSI-derived weight: `10^(rssi/20)`, floored to stay strictly positive.
fn rssi_weight(rssi: f64, floor: f64) -> f64 {
    10f64.powf(rssi / 20.0).max(floor)
}

/// Accuracy as a step function of the number of access points actually used.
fn accuracy_for_count(count: usize) -> f64 {
    match count {
        n if n >= 4 => 30.0,
        3 => 40.0,
        2 => 60.0,
        _ => 100.0,
    }
}

/// Weighted-centroid estimate over every observed access point that has a
/// fingerprint. Observations are deduplicated by bssid, first occurrence
/// wins. Returns [`FusionError::NoOverlap`] when nothing matches.
pub fn estimate_position(
    observations: &[AccessPointObservation],
    fingerprints: &HashMap<String, Fingerprint>,
    config: &LocateConfig,
) -> FusionResult<PositionEstimate> {
    let mut used = Vec::new();
    let mut weight_sum = 0.0;
    let mut latitude_sum = 0.0;
    let mut longitude_sum = 0.0;
    let mut seen = HashSet::new();

    for observation in observations {
        if !seen.insert(observation.bssid.as_str()) {
            continue;
        }
        let fingerprint = match fingerprints.get(&observation.bssid) {
            Some(fingerprint) => fingerprint,
            None => continue,
        };

        let weight = rssi_weight(observation.rssi, config.weight_floor);
        weight_sum += weight;
        latitude_sum += weight * fingerprint.latitude;
        longitude_sum += weight * fingerprint.longitude;

        used.push(UsedAccessPoint {
            bssid: observation.bssid.clone(),
            ssid: observation.ssid.clone(),
            rssi: observation.rssi,
            ap_latitude: fingerprint.latitude,
            ap_longitude: fingerprint.longitude,
            weight,
            samples: fingerprint.samples,
        });
    }

    if used.is_empty() {
        return Err(FusionError::NoOverlap);
    }

    Ok(PositionEstimate {
        latitude: latitude_sum / weight_sum,
        longitude: longitude_sum / weight_sum,
        accuracy_meters: accuracy_for_count(used.len()),
        used_access_points: used,
    })
}

/// Full locate operation: derive fingerprints from the user's historical
/// scans, then estimate the position from the current observations.
///
/// Errors: [`FusionError::InsufficientData`] for an empty observation batch,
/// [`FusionError::NoHistoricalData`] when no observed bssid has history,
/// [`FusionError::NoOverlap`] when no observation matches a fingerprint.
pub fn locate(
    observations: &[AccessPointObservation],
    scans: &[HistoricalScan],
    config: &LocateConfig,
) -> FusionResult<PositionEstimate> {
    if observations.is_empty() {
        return Err(FusionError::InsufficientData(
            "need at least one access-point observation",
        ));
    }

    // only history for bssids actually in view counts
    let observed: HashSet<&str> = observations.iter().map(|o| o.bssid.as_str()).collect();
    let relevant: Vec<HistoricalScan> = scans
        .iter()
        .filter(|scan| observed.contains(scan.bssid.as_str()))
        .cloned()
        .collect();

    let fingerprints = derive_fingerprints(&relevant);
    debug!(
        "derived {} fingerprint(s) from {} of {} historical scan(s)",
        fingerprints.len(),
        relevant.len(),
        scans.len()
    );
    if fingerprints.is_empty() {
        return Err(FusionError::NoHistoricalData);
    }

    estimate_position(observations, &fingerprints, config)
}
