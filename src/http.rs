//! HTTP client for the external map-matching service.
//!
//! Speaks the OSRM-style match API: window coordinates and timestamps are
//! encoded into the URL, the response carries GeoJSON matchings with a
//! confidence. Any non-2xx status or malformed body is a window-level
//! failure the orchestrator recovers from; nothing here retries
//! automatically; retry policy is a caller decision.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::matcher::{MatchClient, MatchedWindow, WindowError};
use crate::RawSample;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for an OSRM-compatible `/match/v1/driving` endpoint.
pub struct OsrmMatchClient {
    client: Client,
    base_url: String,
}

/// Response shape of the match endpoint.
#[derive(Debug, Deserialize)]
struct MatchApiResponse {
    #[serde(default)]
    matchings: Vec<Matching>,
}

#[derive(Debug, Deserialize)]
struct Matching {
    geometry: Geometry,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<[f64; 2]>,
}

impl OsrmMatchClient {
    /// Create a client for the service at `base_url`
    /// (e.g. `http://osrm:5000`).
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET {base}/match/v1/driving/{lon,lat;...}?geometries=geojson&overview=full&timestamps=...`
    fn match_url(&self, points: &[RawSample]) -> String {
        let coordinates = points
            .iter()
            .map(|p| format!("{},{}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";");
        let timestamps = points
            .iter()
            .map(|p| (p.timestamp.round() as i64).to_string())
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/match/v1/driving/{}?geometries=geojson&overview=full&timestamps={}",
            self.base_url, coordinates, timestamps
        )
    }
}

#[async_trait]
impl MatchClient for OsrmMatchClient {
    async fn match_window(&self, points: &[RawSample]) -> Result<MatchedWindow, WindowError> {
        let url = self.match_url(points);
        debug!("match window: {} points", points.len());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WindowError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("match service returned HTTP {}", status);
            return Err(WindowError::Status(status.as_u16()));
        }

        let payload: MatchApiResponse = response
            .json()
            .await
            .map_err(|e| WindowError::Malformed(e.to_string()))?;

        if payload.matchings.is_empty() {
            return Err(WindowError::Empty);
        }

        let mut coordinates = Vec::new();
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0u32;
        for matching in payload.matchings {
            coordinates.extend(matching.geometry.coordinates);
            if let Some(confidence) = matching.confidence {
                confidence_sum += confidence;
                confidence_count += 1;
            }
        }
        let confidence = if confidence_count > 0 {
            Some(confidence_sum / confidence_count as f64)
        } else {
            None
        };

        Ok(MatchedWindow {
            coordinates,
            confidence,
        })
    }
}
