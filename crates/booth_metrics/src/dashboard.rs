//! Dashboard summaries built from loaded booth series.
//!
//! A booth whose series could not be loaded is reported as offline and
//! otherwise left out of the utilization figures.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use common::{BoothConfig, DateRange, PirState, SensorField, SensorReading, Series};
use serde::Serialize;
use tracing::debug;

use crate::comfort::comfort_score;
use crate::hourly::{average_comfort, score_hours, trend_window, HourlyComfort};
use crate::utilization::{capacity_utilization, temporal_utilization};

/// CO₂ above this raises an alert.
pub const CO2_ALERT_PPM: f64 = 1000.0;
/// Temperature above this raises an alert.
pub const TEMPERATURE_ALERT_C: f64 = 25.0;

// ── Status ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BoothStatus {
    Online {
        location: String,
        booth: String,
        last_seen: Option<NaiveDateTime>,
        pir_state: Option<PirState>,
        count: Option<u32>,
        comfort_score: f64,
    },
    Offline {
        location: String,
        booth: String,
    },
}

impl BoothStatus {
    pub fn location(&self) -> &str {
        match self {
            BoothStatus::Online { location, .. } | BoothStatus::Offline { location, .. } => {
                location.as_str()
            }
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(
            self,
            BoothStatus::Online {
                pir_state: Some(PirState::Occupied),
                ..
            }
        )
    }
}

/// Latest-reading snapshot for one booth, or `Offline` without data.
pub fn booth_status(booth: &BoothConfig, series: Option<&Series>) -> BoothStatus {
    match series.and_then(Series::latest) {
        Some(latest) => BoothStatus::Online {
            location: booth.location.clone(),
            booth: booth.booth.clone(),
            last_seen: latest.timestamp,
            pir_state: latest.pir(),
            count: latest.occupancy_count,
            comfort_score: comfort_score(latest),
        },
        None => BoothStatus::Offline {
            location: booth.location.clone(),
            booth: booth.booth.clone(),
        },
    }
}

// ── Alerts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    HighCo2 {
        location: String,
        booth: String,
        ppm: f64,
    },
    HighTemperature {
        location: String,
        booth: String,
        celsius: f64,
    },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::HighCo2 {
                location,
                booth,
                ppm,
            } => write!(f, "High CO₂ in {location}, {booth}: {ppm:.0} ppm"),
            Alert::HighTemperature {
                location,
                booth,
                celsius,
            } => write!(f, "High Temp in {location}, {booth}: {celsius}°C"),
        }
    }
}

/// Threshold alerts raised by `reading`.
pub fn alerts(booth: &BoothConfig, reading: &SensorReading) -> Vec<Alert> {
    let mut raised = Vec::new();
    if let Some(ppm) = reading.co2_ppm.filter(|&v| v > CO2_ALERT_PPM) {
        raised.push(Alert::HighCo2 {
            location: booth.location.clone(),
            booth: booth.booth.clone(),
            ppm,
        });
    }
    if let Some(celsius) = reading.temp_c.filter(|&v| v > TEMPERATURE_ALERT_C) {
        raised.push(Alert::HighTemperature {
            location: booth.location.clone(),
            booth: booth.booth.clone(),
            celsius,
        });
    }
    raised
}

// ── Performance ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoothPerformance {
    pub location: String,
    pub booth: String,
    pub booth_id: String,
    pub readings_in_range: usize,
    /// Percent of PIR readings that were "Occupied".
    pub temporal_util: f64,
    /// Mean headcount as a percent of the booth's capacity.
    pub capacity_util: f64,
}

pub fn booth_performance(booth: &BoothConfig, series: &Series, range: &DateRange) -> BoothPerformance {
    BoothPerformance {
        location: booth.location.clone(),
        booth: booth.booth.clone(),
        booth_id: booth.booth_id.clone(),
        readings_in_range: series.in_range(range).count(),
        temporal_util: temporal_utilization(series, range),
        capacity_util: capacity_utilization(series, range, booth.max_occupancy),
    }
}

/// Location averages, rounded to one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LocationPerformance {
    pub time: f64,
    pub capacity: f64,
}

// ── Portfolio ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub range: DateRange,
    pub total_booths: usize,
    pub currently_occupied: usize,
    /// Mean temporal utilization over booths with data; a booth with no
    /// readings in range counts as 0.
    pub average_utilization: f64,
    pub booth_breakdown: BTreeMap<String, usize>,
    pub occupied_breakdown: BTreeMap<String, usize>,
    pub location_performance: BTreeMap<String, LocationPerformance>,
    pub performance: Vec<BoothPerformance>,
    pub statuses: Vec<BoothStatus>,
    pub alerts: Vec<Alert>,
    /// The last 72 scored hours.
    pub hourly_comfort: Vec<HourlyComfort>,
    /// Mean over every scored hour, not only the trend window.
    pub average_comfort: f64,
}

/// Roll the whole roster up into the portfolio dashboard.
pub fn portfolio_summary(
    roster: &[(BoothConfig, Option<Series>)],
    range: &DateRange,
) -> PortfolioSummary {
    let mut statuses = Vec::with_capacity(roster.len());
    let mut raised = Vec::new();
    let mut performance = Vec::new();
    let mut utilization = Vec::new();
    let mut booth_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    let mut occupied_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    let mut loaded = Vec::new();

    for (booth, series) in roster {
        *booth_breakdown.entry(booth.location.clone()).or_default() += 1;

        let status = booth_status(booth, series.as_ref());
        if status.is_occupied() {
            *occupied_breakdown.entry(booth.location.clone()).or_default() += 1;
        }
        statuses.push(status);

        let Some(series) = series.as_ref().filter(|s| !s.is_empty()) else {
            continue;
        };
        loaded.push(series.clone());
        if let Some(latest) = series.latest() {
            raised.extend(alerts(booth, latest));
        }

        let perf = booth_performance(booth, series, range);
        if perf.readings_in_range == 0 {
            utilization.push(0.0);
            continue;
        }
        utilization.push(perf.temporal_util);
        performance.push(perf);
    }

    let location_performance = booth_breakdown
        .keys()
        .map(|location| {
            let rows: Vec<&BoothPerformance> = performance
                .iter()
                .filter(|p| &p.location == location)
                .collect();
            let averages = if rows.is_empty() {
                LocationPerformance::default()
            } else {
                let n = rows.len() as f64;
                LocationPerformance {
                    time: round1(rows.iter().map(|p| p.temporal_util).sum::<f64>() / n),
                    capacity: round1(rows.iter().map(|p| p.capacity_util).sum::<f64>() / n),
                }
            };
            (location.clone(), averages)
        })
        .collect();

    let scored_hours = score_hours(&loaded);
    let average_comfort = average_comfort(&scored_hours);
    let hourly_comfort = trend_window(scored_hours);
    let currently_occupied = occupied_breakdown.values().sum();

    debug!(
        booths = roster.len(),
        online = loaded.len(),
        occupied = currently_occupied,
        alerts = raised.len(),
        "Portfolio summary computed"
    );

    PortfolioSummary {
        range: *range,
        total_booths: roster.len(),
        currently_occupied,
        average_utilization: mean(&utilization),
        booth_breakdown,
        occupied_breakdown,
        location_performance,
        performance,
        statuses,
        alerts: raised,
        hourly_comfort,
        average_comfort,
    }
}

// ── Metric drill-down ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyMean {
    pub day: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub field: SensorField,
    pub name: &'static str,
    pub unit: &'static str,
    /// Value of the last in-range reading, if it carried one.
    pub current: Option<f64>,
    pub average: Option<f64>,
    /// One mean per calendar day, rounded to two decimals. Days without a
    /// value are omitted.
    pub daily: Vec<DailyMean>,
}

pub fn metric_summary(series: &Series, field: SensorField, range: &DateRange) -> MetricSummary {
    let in_range: Vec<&SensorReading> = series.in_range(range).collect();
    let values: Vec<f64> = in_range.iter().filter_map(|r| r.value(field)).collect();

    let mut days: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
    for reading in &in_range {
        if let (Some(ts), Some(v)) = (reading.timestamp, reading.value(field)) {
            let day = days.entry(ts.date()).or_default();
            day.0 += v;
            day.1 += 1;
        }
    }

    MetricSummary {
        field,
        name: field.display_name(),
        unit: field.unit(),
        current: in_range.last().and_then(|r| r.value(field)),
        average: (!values.is_empty()).then(|| mean(&values)),
        daily: days
            .into_iter()
            .map(|(day, (sum, n))| DailyMean {
                day,
                value: round2(sum / f64::from(n)),
            })
            .collect(),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
