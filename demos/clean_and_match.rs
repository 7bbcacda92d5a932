//! Clean a noisy trace and stitch a matched geometry from it.
//!
//! Uses a stand-in match client that simply echoes each window, so the demo
//! runs without a routing service. Point `OsrmMatchClient` at a real OSRM
//! instance (feature `http`) for actual snapping.
//!
//! Run with: cargo run --example clean_and_match

use async_trait::async_trait;
use trace_fusion::{
    clean_trace, match_trace, CleanConfig, MatchClient, MatchConfig, MatchedWindow, RawSample,
    WindowError,
};

/// Echoes the window back as if the road network matched it perfectly.
struct EchoClient;

#[async_trait]
impl MatchClient for EchoClient {
    async fn match_window(&self, points: &[RawSample]) -> Result<MatchedWindow, WindowError> {
        Ok(MatchedWindow {
            coordinates: points.iter().map(|p| [p.longitude, p.latitude]).collect(),
            confidence: Some(0.9),
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    // A commute: 2 minutes parked, then movement, then a GPS glitch
    let mut samples: Vec<RawSample> = (0..12)
        .map(|i| RawSample::new(51.5074, -0.1278, i as f64 * 10.0))
        .collect();
    for i in 0..20 {
        samples.push(RawSample::new(
            51.5080 + i as f64 * 0.0008,
            -0.1290 - i as f64 * 0.0005,
            130.0 + i as f64 * 15.0,
        ));
    }
    // teleport to Scotland, which no vehicle does in 15 seconds
    samples.push(RawSample::new(56.0, -4.0, 445.0));

    println!("raw samples: {}", samples.len());

    let trace = clean_trace(samples, &CleanConfig::default()).expect("trace survives cleaning");
    println!("cleaned points: {}", trace.len());

    let geometry = match_trace(&EchoClient, &trace, &MatchConfig::default())
        .await
        .expect("echo client always matches");

    println!(
        "matched geometry: {} coordinates, confidence {:?}",
        geometry.coordinates.len(),
        geometry.confidence
    );
    for coordinate in geometry.coordinates.iter().take(3) {
        println!("  [{:.4}, {:.4}]", coordinate[0], coordinate[1]);
    }
}
