//! Estimate a position from Wi-Fi access points and historical sightings.
//!
//! Run with: cargo run --example wifi_position

use trace_fusion::{locate, AccessPointObservation, HistoricalScan, LocateConfig};

fn main() {
    env_logger::init();

    // Two access points the user has seen before: home router (many
    // sightings) and a neighbor's (few, slightly offset)
    let mut scans = Vec::new();
    for i in 0..8 {
        scans.push(HistoricalScan {
            bssid: "aa:bb:cc:dd:ee:01".to_string(),
            latitude: Some(51.5074 + i as f64 * 0.00001),
            longitude: Some(-0.1278),
        });
    }
    for _ in 0..3 {
        scans.push(HistoricalScan {
            bssid: "aa:bb:cc:dd:ee:02".to_string(),
            latitude: Some(51.5078),
            longitude: Some(-0.1272),
        });
    }

    // Currently visible: home router strong, neighbor weak
    let observations = vec![
        AccessPointObservation {
            bssid: "aa:bb:cc:dd:ee:01".to_string(),
            rssi: -45.0,
            ssid: Some("home".to_string()),
        },
        AccessPointObservation {
            bssid: "aa:bb:cc:dd:ee:02".to_string(),
            rssi: -78.0,
            ssid: None,
        },
    ];

    match locate(&observations, &scans, &LocateConfig::default()) {
        Ok(estimate) => {
            println!(
                "estimated position: {:.6}, {:.6} (±{:.0}m)",
                estimate.latitude, estimate.longitude, estimate.accuracy_meters
            );
            for ap in &estimate.used_access_points {
                println!(
                    "  {} rssi={} weight={:.6} samples={}",
                    ap.bssid, ap.rssi, ap.weight, ap.samples
                );
            }
        }
        Err(err) => eprintln!("no estimate: {}", err),
    }
}
