//! JSON API exposing the fusion pipeline.
//!
//! A thin axum surface over the four components; persistence and
//! authentication live behind the injected collaborators in [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/trajectory` | Clean and map-match a raw trace |
//! | `POST` | `/position` | Wi-Fi fingerprint position estimate |
//! | `GET`  | `/proximity` | Per-device distance aggregates |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses follow one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "insufficient data: ..." } }
//! ```
//!
//! with the status from [`FusionError::http_status`]: `bad_request` (400),
//! `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! dashboard clients.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::cleaner::clean_trace;
use crate::error::FusionError;
use crate::fingerprint::{locate, AccessPointObservation, PositionEstimate};
use crate::matcher::{match_trace, MatchClient};
use crate::proximity::{aggregate_proximity, DistanceAggregate};
use crate::store::{HistoryFilter, HistoryStore};
use crate::{FusionConfig, RawSample};

/// Shared state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Client for the external map-matching service
    pub matcher: Arc<dyn MatchClient>,
    /// Read-only, user-scoped historical store
    pub history: Arc<dyn HistoryStore>,
    /// Pipeline tuning constants
    pub config: Arc<FusionConfig>,
}

/// Build the router with all endpoints registered.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/trajectory", post(reconstruct_trajectory))
        .route("/position", post(fingerprint_position))
        .route("/proximity", get(proximity_summary))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("fusion API listening on {}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Error rendering
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

fn error_response(err: FusionError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!("request failed: {}", err);
    }
    (
        status,
        Json(ErrorBody {
            error: ErrorDetail {
                code: err.code(),
                message: err.to_string(),
            },
        }),
    )
        .into_response()
}

// ============================================================================
// POST /trajectory
// ============================================================================

#[derive(Deserialize)]
struct TrajectoryRequest {
    points: Vec<TrajectoryPoint>,
}

/// Wire point; missing fields become invalid samples so the cleaner applies
/// its drop-and-flush rule instead of the request failing wholesale.
#[derive(Deserialize)]
struct TrajectoryPoint {
    lat: Option<f64>,
    lon: Option<f64>,
    timestamp: Option<f64>,
}

impl TrajectoryPoint {
    fn into_sample(self) -> RawSample {
        RawSample::new(
            self.lat.unwrap_or(f64::NAN),
            self.lon.unwrap_or(f64::NAN),
            self.timestamp.unwrap_or(f64::NAN),
        )
    }
}

#[derive(Serialize)]
struct TrajectoryResponse {
    snapped: LineStringDto,
    confidence: Option<f64>,
}

#[derive(Serialize)]
struct LineStringDto {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: Vec<[f64; 2]>,
}

async fn reconstruct_trajectory(
    State(state): State<AppState>,
    Json(request): Json<TrajectoryRequest>,
) -> Response {
    if request.points.len() < 2 {
        return error_response(FusionError::InsufficientData("need at least 2 points"));
    }

    let samples: Vec<RawSample> = request
        .points
        .into_iter()
        .map(TrajectoryPoint::into_sample)
        .collect();

    let trace = match clean_trace(samples, &state.config.clean) {
        Ok(trace) => trace,
        Err(err) => return error_response(err),
    };

    match match_trace(state.matcher.as_ref(), &trace, &state.config.matching).await {
        Ok(geometry) => (
            StatusCode::OK,
            Json(TrajectoryResponse {
                snapped: LineStringDto {
                    kind: "LineString",
                    coordinates: geometry.coordinates,
                },
                confidence: geometry.confidence,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// POST /position
// ============================================================================

/// Accepts `{ "wifi": [...] }` or a bare observation array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PositionRequest {
    Wrapped { wifi: Vec<WifiObservationDto> },
    Bare(Vec<WifiObservationDto>),
}

#[derive(Deserialize)]
struct WifiObservationDto {
    bssid: Option<String>,
    rssi: Option<f64>,
    ssid: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionResponse {
    latitude: f64,
    longitude: f64,
    accuracy_meters: f64,
    access_points_used: Vec<UsedAccessPointDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsedAccessPointDto {
    bssid: String,
    ssid: Option<String>,
    rssi: f64,
    ap_latitude: f64,
    ap_longitude: f64,
    weight: f64,
    samples: u32,
}

impl From<PositionEstimate> for PositionResponse {
    fn from(estimate: PositionEstimate) -> Self {
        Self {
            latitude: estimate.latitude,
            longitude: estimate.longitude,
            accuracy_meters: estimate.accuracy_meters,
            access_points_used: estimate
                .used_access_points
                .into_iter()
                .map(|ap| UsedAccessPointDto {
                    bssid: ap.bssid,
                    ssid: ap.ssid,
                    rssi: ap.rssi,
                    ap_latitude: ap.ap_latitude,
                    ap_longitude: ap.ap_longitude,
                    weight: ap.weight,
                    samples: ap.samples,
                })
                .collect(),
        }
    }
}

async fn fingerprint_position(
    State(state): State<AppState>,
    Json(request): Json<PositionRequest>,
) -> Response {
    let raw = match request {
        PositionRequest::Wrapped { wifi } => wifi,
        PositionRequest::Bare(wifi) => wifi,
    };

    let observations: Vec<AccessPointObservation> = raw
        .into_iter()
        .filter_map(|dto| {
            let bssid = dto.bssid.filter(|b| !b.is_empty())?;
            let rssi = dto.rssi.filter(|r| r.is_finite())?;
            Some(AccessPointObservation {
                bssid,
                rssi,
                ssid: dto.ssid,
            })
        })
        .collect();

    if observations.is_empty() {
        return error_response(FusionError::InsufficientData(
            "no valid access-point observations",
        ));
    }

    let bssids: Vec<String> = observations.iter().map(|o| o.bssid.clone()).collect();
    let scans = match state.history.access_point_scans(&bssids).await {
        Ok(scans) => scans,
        Err(err) => return error_response(FusionError::Store(err)),
    };

    match locate(&observations, &scans, &state.config.locate) {
        Ok(estimate) => (StatusCode::OK, Json(PositionResponse::from(estimate))).into_response(),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// GET /proximity
// ============================================================================

#[derive(Deserialize)]
struct ProximityQuery {
    from: Option<String>,
    to: Option<String>,
    #[serde(rename = "sessionIds")]
    session_ids: Option<String>,
}

#[derive(Serialize)]
struct ProximityResponse {
    devices: Vec<DeviceDistanceDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDistanceDto {
    distance_key: String,
    #[serde(rename = "type")]
    kind: &'static str,
    identifier: String,
    count: u32,
    min_meters: f64,
    max_meters: f64,
    avg_meters: f64,
}

impl From<DistanceAggregate> for DeviceDistanceDto {
    fn from(aggregate: DistanceAggregate) -> Self {
        Self {
            distance_key: aggregate.key(),
            kind: aggregate.kind.as_str(),
            identifier: aggregate.identifier,
            count: aggregate.count,
            min_meters: aggregate.min_meters,
            max_meters: aggregate.max_meters,
            avg_meters: aggregate.avg_meters,
        }
    }
}

/// Parse an optional ISO-8601 timestamp into epoch seconds.
fn parse_epoch(value: Option<&str>) -> Result<Option<f64>, FusionError> {
    match value {
        None => Ok(None),
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.timestamp_millis() as f64 / 1000.0))
            .map_err(|_| FusionError::InsufficientData("timestamps must be ISO-8601")),
    }
}

fn history_filter(query: &ProximityQuery) -> Result<HistoryFilter, FusionError> {
    Ok(HistoryFilter {
        from: parse_epoch(query.from.as_deref())?,
        to: parse_epoch(query.to.as_deref())?,
        session_ids: query
            .session_ids
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

async fn proximity_summary(
    State(state): State<AppState>,
    Query(query): Query<ProximityQuery>,
) -> Response {
    let filter = match history_filter(&query) {
        Ok(filter) => filter,
        Err(err) => return error_response(err),
    };

    let locations = match state.history.own_locations(&filter).await {
        Ok(locations) => locations,
        Err(err) => return error_response(FusionError::Store(err)),
    };
    let observations = match state.history.device_observations(&filter).await {
        Ok(observations) => observations,
        Err(err) => return error_response(FusionError::Store(err)),
    };

    let aggregates = aggregate_proximity(&locations, &observations);
    (
        StatusCode::OK,
        Json(ProximityResponse {
            devices: aggregates.into_iter().map(DeviceDistanceDto::from).collect(),
        }),
    )
        .into_response()
}

// ============================================================================
// GET /health
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
