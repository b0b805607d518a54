//! Comfort scoring for a single reading or an hourly aggregate.
//!
//! Each present environmental metric is banded to 0, 25, 50, 75 or 100 and
//! the score is the plain mean of the bands that could be computed. Bounds
//! are inclusive on the "better" side.

use common::SensorReading;
use serde::{Deserialize, Serialize};

// ── Public Types ──────────────────────────────────────────────────────

/// The five metrics that feed the comfort score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub co2_ppm: Option<f64>,
    pub voc: Option<f64>,
    pub pm25_ugm3: Option<f64>,
}

impl From<&SensorReading> for EnvironmentSample {
    fn from(r: &SensorReading) -> Self {
        Self {
            temp_c: r.temp_c,
            humidity_pct: r.humidity_pct,
            co2_ppm: r.co2_ppm,
            voc: r.voc,
            pm25_ugm3: r.pm25_ugm3,
        }
    }
}

// ── Main API ──────────────────────────────────────────────────────────

/// Comfort score (0–100) of one reading. 0 when no scored metric is present.
pub fn comfort_score(reading: &SensorReading) -> f64 {
    score_environment(&EnvironmentSample::from(reading))
}

pub fn score_environment(sample: &EnvironmentSample) -> f64 {
    let bands = [
        sample.temp_c.map(temperature_band),
        sample.humidity_pct.map(humidity_band),
        sample.co2_ppm.map(co2_band),
        sample.voc.map(voc_band),
        sample.pm25_ugm3.map(pm25_band),
    ];

    let (sum, n) = bands
        .iter()
        .flatten()
        .fold((0.0, 0u32), |(sum, n), band| (sum + band, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / f64::from(n)
    }
}

// ── Bands ─────────────────────────────────────────────────────────────

fn temperature_band(t: f64) -> f64 {
    if (20.0..=25.0).contains(&t) {
        100.0
    } else if (18.0..20.0).contains(&t) || (t > 25.0 && t <= 27.0) {
        50.0
    } else {
        0.0
    }
}

fn humidity_band(h: f64) -> f64 {
    if (40.0..=50.0).contains(&h) {
        100.0
    } else if (30.0..40.0).contains(&h) || (h > 50.0 && h <= 60.0) {
        50.0
    } else {
        0.0
    }
}

fn co2_band(ppm: f64) -> f64 {
    if ppm <= 600.0 {
        100.0
    } else if ppm <= 1000.0 {
        75.0
    } else if ppm <= 2000.0 {
        25.0
    } else {
        0.0
    }
}

fn voc_band(voc: f64) -> f64 {
    if voc <= 300.0 {
        100.0
    } else if voc <= 500.0 {
        50.0
    } else {
        0.0
    }
}

fn pm25_band(pm: f64) -> f64 {
    if pm <= 12.0 {
        100.0
    } else if pm <= 35.0 {
        50.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_reading_scores_100() {
        let reading = SensorReading {
            temp_c: Some(22.0),
            humidity_pct: Some(45.0),
            co2_ppm: Some(500.0),
            voc: Some(200.0),
            pm25_ugm3: Some(10.0),
            ..Default::default()
        };
        assert_eq!(comfort_score(&reading), 100.0);
    }

    #[test]
    fn test_only_present_metrics_are_averaged() {
        let co2_only = SensorReading {
            co2_ppm: Some(1500.0),
            ..Default::default()
        };
        assert_eq!(comfort_score(&co2_only), 25.0);

        // Light and sound are not scored.
        let unscored = SensorReading {
            light_lux: Some(300.0),
            sound_dba: Some(40.0),
            ..Default::default()
        };
        assert_eq!(comfort_score(&unscored), 0.0);
        assert_eq!(comfort_score(&SensorReading::default()), 0.0);
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        assert_eq!(temperature_band(20.0), 100.0);
        assert_eq!(temperature_band(25.0), 100.0);
        assert_eq!(temperature_band(18.0), 50.0);
        assert_eq!(temperature_band(27.0), 50.0);
        assert_eq!(temperature_band(27.1), 0.0);
        assert_eq!(temperature_band(17.9), 0.0);

        assert_eq!(humidity_band(40.0), 100.0);
        assert_eq!(humidity_band(50.0), 100.0);
        assert_eq!(humidity_band(30.0), 50.0);
        assert_eq!(humidity_band(60.0), 50.0);
        assert_eq!(humidity_band(61.0), 0.0);

        assert_eq!(co2_band(600.0), 100.0);
        assert_eq!(co2_band(1000.0), 75.0);
        assert_eq!(co2_band(2000.0), 25.0);
        assert_eq!(co2_band(2001.0), 0.0);

        assert_eq!(voc_band(300.0), 100.0);
        assert_eq!(voc_band(500.0), 50.0);
        assert_eq!(voc_band(501.0), 0.0);

        assert_eq!(pm25_band(12.0), 100.0);
        assert_eq!(pm25_band(35.0), 50.0);
        assert_eq!(pm25_band(35.5), 0.0);
    }

    #[test]
    fn test_mixed_bands_average() {
        let sample = EnvironmentSample {
            temp_c: Some(26.0),
            humidity_pct: Some(45.0),
            co2_ppm: Some(800.0),
            ..Default::default()
        };
        // (50 + 100 + 75) / 3
        assert_eq!(score_environment(&sample), 75.0);
    }
}
