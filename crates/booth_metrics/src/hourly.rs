//! Portfolio-wide comfort trend, one point per calendar hour.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use common::{SensorField, SensorReading, Series};
use serde::{Deserialize, Serialize};

use crate::comfort::{score_environment, EnvironmentSample};

/// Hours kept in the trend (three days).
pub const TREND_HOURS: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyComfort {
    /// Start of the hour.
    pub hour: NaiveDateTime,
    pub score: f64,
}

/// Running per-field sums for one hour bucket.
#[derive(Default)]
struct HourBucket {
    sums: [f64; SensorField::ALL.len()],
    counts: [u32; SensorField::ALL.len()],
}

impl HourBucket {
    fn add(&mut self, reading: &SensorReading) {
        for (i, field) in SensorField::ALL.into_iter().enumerate() {
            if let Some(v) = reading.value(field) {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.counts.iter().all(|&n| n == 0)
    }

    fn mean(&self, field: SensorField) -> Option<f64> {
        let i = SensorField::ALL.iter().position(|&f| f == field)?;
        (self.counts[i] > 0).then(|| self.sums[i] / f64::from(self.counts[i]))
    }

    fn sample(&self) -> EnvironmentSample {
        EnvironmentSample {
            temp_c: self.mean(SensorField::TempC),
            humidity_pct: self.mean(SensorField::HumidityPct),
            co2_ppm: self.mean(SensorField::Co2Ppm),
            voc: self.mean(SensorField::Voc),
            pm25_ugm3: self.mean(SensorField::Pm25Ugm3),
        }
    }
}

fn hour_start(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    ts.date().and_hms_opt(ts.hour(), 0, 0)
}

/// Merge every booth's readings into hourly means and score each hour.
///
/// Untimed readings are skipped, as are hours where no field had a value.
/// Every scored hour is returned, oldest first.
pub fn score_hours(all: &[Series]) -> Vec<HourlyComfort> {
    let mut buckets: BTreeMap<NaiveDateTime, HourBucket> = BTreeMap::new();
    for reading in all.iter().flat_map(Series::iter) {
        let Some(hour) = reading.timestamp.and_then(hour_start) else {
            continue;
        };
        buckets.entry(hour).or_default().add(reading);
    }

    buckets
        .into_iter()
        .filter(|(_, bucket)| !bucket.is_empty())
        .map(|(hour, bucket)| HourlyComfort {
            hour,
            score: score_environment(&bucket.sample()),
        })
        .collect()
}

/// The most recent [`TREND_HOURS`] points of `scored`, oldest first.
pub fn trend_window(mut scored: Vec<HourlyComfort>) -> Vec<HourlyComfort> {
    let skip = scored.len().saturating_sub(TREND_HOURS);
    scored.drain(..skip);
    scored
}

/// [`score_hours`] trimmed to the last [`TREND_HOURS`] points.
pub fn hourly_portfolio_comfort(all: &[Series]) -> Vec<HourlyComfort> {
    trend_window(score_hours(all))
}

/// Mean score across `points`, 0 for an empty trend.
pub fn average_comfort(points: &[HourlyComfort]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.score).sum::<f64>() / points.len() as f64
}
