use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Regions and their sampling weights for the fabricated records.
const REGIONS: [(&str, f64); 5] = [
    ("Ouest", 0.4),
    ("Artibonite", 0.2),
    ("Nord", 0.2),
    ("Sud-Est", 0.1),
    ("Grand-Anse", 0.1),
];

const NUM_RECORDS: usize = 200;

// 2024-03-01 through 2024-05-20 inclusive.
const DATE_RANGE_DAYS: i64 = 81;

#[derive(Debug, Clone, Serialize)]
pub struct CommunityRecord {
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub sulfate: f64,
    pub prediction: u8,
    pub prediction_label: String,
}

/// Fabricates the aggregate records behind `/api/community_summary`.
///
/// This stands in for a real aggregation query; nothing here reads stored
/// observations. A fixed seed makes the output reproducible for tests,
/// otherwise each call draws fresh entropy.
#[derive(Debug, Clone, Copy)]
pub struct SummaryGenerator {
    seed: Option<u64>,
}

impl SummaryGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn generate(&self) -> Vec<CommunityRecord> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut records = Vec::with_capacity(NUM_RECORDS);
        for _ in 0..NUM_RECORDS {
            let timestamp = start + Duration::days(rng.gen_range(0..DATE_RANGE_DAYS));
            let region = weighted_region(rng.gen::<f64>()).to_string();
            let sulfate = rng.gen_range(250.0..450.0);
            // 0 = Unsafe (p=0.4), 1 = Safe (p=0.6)
            let prediction = if rng.gen::<f64>() < 0.4 { 0 } else { 1 };
            let prediction_label = if prediction == 1 { "Safe" } else { "Unsafe" };

            records.push(CommunityRecord {
                timestamp,
                region,
                sulfate,
                prediction,
                prediction_label: prediction_label.to_string(),
            });
        }
        records
    }
}

fn weighted_region(draw: f64) -> &'static str {
    let mut cumulative = 0.0;
    for (region, weight) in REGIONS {
        cumulative += weight;
        if draw < cumulative {
            return region;
        }
    }
    REGIONS[REGIONS.len() - 1].0
}
