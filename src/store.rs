use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Alert radius for the proximity check, in kilometers.
pub const ALERT_RADIUS_KM: f64 = 5.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointStatus {
    Potable,
    #[serde(rename = "Not Potable")]
    NotPotable,
    Caution,
}

/// A known water source on the map. Seeded at startup; the only mutation
/// for the life of the process is Potable -> Caution via the proximity alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringPoint {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub status: PointStatus,
    pub verified: bool,
    pub history: BTreeMap<String, Vec<f64>>,
}

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}

/// Owner of the monitoring-point collection, shared across request handlers.
///
/// The mutex covers the whole scan-and-demote of the proximity check, so
/// concurrent classifications can neither double-demote a point nor observe
/// one mid-update. It is never held across an await.
#[derive(Clone)]
pub struct WaterPointStore {
    points: Arc<Mutex<Vec<MonitoringPoint>>>,
}

impl WaterPointStore {
    pub fn new(points: Vec<MonitoringPoint>) -> Self {
        for point in &points {
            debug_assert!((-90.0..=90.0).contains(&point.lat), "latitude out of range");
            debug_assert!(
                (-180.0..=180.0).contains(&point.lon),
                "longitude out of range"
            );
        }
        if let Some(dup) = first_duplicate_id(&points) {
            warn!("Duplicate monitoring point id {} in seed data", dup);
        }
        Self {
            points: Arc::new(Mutex::new(points)),
        }
    }

    /// The fixed demo collection the service starts with.
    pub fn with_sample_points() -> Self {
        Self::new(sample_points())
    }

    /// Consistent copy of the collection for serialization.
    pub fn snapshot(&self) -> Vec<MonitoringPoint> {
        self.points.lock().unwrap().clone()
    }

    /// Run the proximity check for an unsafe sample at (lat, lon).
    ///
    /// Scans points in stored order and demotes the first one that is still
    /// Potable and closer than [`ALERT_RADIUS_KM`]. First match wins, even if
    /// a later point is strictly closer. Returns the alert message naming
    /// the demoted point, or None if nothing qualified.
    #[instrument(skip(self))]
    pub fn raise_proximity_alert(&self, lat: f64, lon: f64) -> Option<String> {
        let mut points = self.points.lock().unwrap();
        for point in points.iter_mut() {
            let dist = haversine_km(lat, lon, point.lat, point.lon);
            if point.status == PointStatus::Potable && dist < ALERT_RADIUS_KM {
                point.status = PointStatus::Caution;
                info!(
                    "Demoted '{}' to Caution ({:.2} km from reported sample)",
                    point.name, dist
                );
                return Some(format!(
                    "PROACTIVE ALERT: A new unsafe source was reported nearby. \
                     The status of '{}' has been changed to 'Caution' on the map. \
                     Please re-test before use.",
                    point.name
                ));
            }
        }
        debug!("No potable point within {} km of sample", ALERT_RADIUS_KM);
        None
    }
}

fn first_duplicate_id(points: &[MonitoringPoint]) -> Option<i64> {
    let mut seen = Vec::with_capacity(points.len());
    for point in points {
        if seen.contains(&point.id) {
            return Some(point.id);
        }
        seen.push(point.id);
    }
    None
}

fn sample_points() -> Vec<MonitoringPoint> {
    vec![
        MonitoringPoint {
            id: 1,
            name: "Community Well - Cité Soleil".to_string(),
            lat: 18.5794,
            lon: -72.3375,
            status: PointStatus::NotPotable,
            verified: false,
            history: BTreeMap::from([
                ("Sulfate".to_string(), vec![380.0, 385.0, 392.0, 405.0]),
                ("Turbidity".to_string(), vec![5.1, 5.3, 5.2, 5.8]),
            ]),
        },
        MonitoringPoint {
            id: 2,
            name: "Verified NGO Tap - Pétion-Ville".to_string(),
            lat: 18.5135,
            lon: -72.2852,
            status: PointStatus::Potable,
            verified: true,
            history: BTreeMap::from([
                ("Sulfate".to_string(), vec![330.0, 332.0, 331.0, 334.0]),
                ("Turbidity".to_string(), vec![3.1, 3.0, 3.2, 3.1]),
            ]),
        },
        MonitoringPoint {
            id: 3,
            name: "River Outlet - Mariani".to_string(),
            lat: 18.5020,
            lon: -72.3995,
            status: PointStatus::Potable,
            verified: false,
            history: BTreeMap::from([
                ("Sulfate".to_string(), vec![340.0, 338.0, 342.0, 345.0]),
                ("Turbidity".to_string(), vec![3.8, 3.9, 3.7, 4.0]),
            ]),
        },
    ]
}
