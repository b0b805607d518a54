//! Domain types shared across the workspace.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ── Keys ──────────────────────────────────────────────────────────────

/// Cache and remote lookup key for one booth: `location_booth` with all
/// whitespace removed from both parts.
///
/// Names that only differ in whitespace placement collapse to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub const SEPARATOR: char = '_';

    pub fn new(location: &str, booth: &str) -> Self {
        let mut key = String::with_capacity(location.len() + booth.len() + 1);
        key.extend(location.chars().filter(|c| !c.is_whitespace()));
        key.push(Self::SEPARATOR);
        key.extend(booth.chars().filter(|c| !c.is_whitespace()));
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Raw provider rows ─────────────────────────────────────────────────

/// A single cell as delivered by the remote tabular source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// One untyped record: field name → cell (absent cells are `None`).
pub type RawRow = HashMap<String, Option<RawValue>>;

// ── Readings ──────────────────────────────────────────────────────────

/// Occupancy sensor state after trimming and case folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PirState {
    Occupied,
    Vacant,
    Other,
}

impl PirState {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("occupied") {
            PirState::Occupied
        } else if trimmed.eq_ignore_ascii_case("vacant") {
            PirState::Vacant
        } else {
            PirState::Other
        }
    }
}

/// One timestamped observation for a booth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: Option<NaiveDateTime>,
    pub temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub co2_ppm: Option<f64>,
    pub voc: Option<f64>,
    pub pm25_ugm3: Option<f64>,
    pub ch2o_ppm: Option<f64>,
    pub light_lux: Option<f64>,
    #[serde(rename = "sound_dBA")]
    pub sound_dba: Option<f64>,
    pub occupancy_count: Option<u32>,
    pub pir_state: Option<String>,
}

impl SensorReading {
    /// Canonical PIR state, if one was reported.
    pub fn pir(&self) -> Option<PirState> {
        self.pir_state.as_deref().map(PirState::parse)
    }

    pub fn is_occupied(&self) -> bool {
        self.pir() == Some(PirState::Occupied)
    }

    /// Numeric value of `field`, widened to `f64`.
    pub fn value(&self, field: SensorField) -> Option<f64> {
        match field {
            SensorField::TempC => self.temp_c,
            SensorField::HumidityPct => self.humidity_pct,
            SensorField::Co2Ppm => self.co2_ppm,
            SensorField::Voc => self.voc,
            SensorField::Pm25Ugm3 => self.pm25_ugm3,
            SensorField::Ch2oPpm => self.ch2o_ppm,
            SensorField::LightLux => self.light_lux,
            SensorField::SoundDba => self.sound_dba,
            SensorField::OccupancyCount => self.occupancy_count.map(f64::from),
        }
    }
}

/// Numeric sensor columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorField {
    #[serde(rename = "temp_c")]
    TempC,
    #[serde(rename = "humidity_pct")]
    HumidityPct,
    #[serde(rename = "co2_ppm")]
    Co2Ppm,
    #[serde(rename = "voc")]
    Voc,
    #[serde(rename = "pm25_ugm3")]
    Pm25Ugm3,
    #[serde(rename = "ch2o_ppm")]
    Ch2oPpm,
    #[serde(rename = "light_lux")]
    LightLux,
    #[serde(rename = "sound_dBA")]
    SoundDba,
    #[serde(rename = "occupancy_count")]
    OccupancyCount,
}

impl SensorField {
    pub const ALL: [SensorField; 9] = [
        SensorField::TempC,
        SensorField::HumidityPct,
        SensorField::Co2Ppm,
        SensorField::Voc,
        SensorField::Pm25Ugm3,
        SensorField::Ch2oPpm,
        SensorField::LightLux,
        SensorField::SoundDba,
        SensorField::OccupancyCount,
    ];

    /// Column name used by the remote source.
    pub fn column(self) -> &'static str {
        match self {
            SensorField::TempC => "temp_c",
            SensorField::HumidityPct => "humidity_pct",
            SensorField::Co2Ppm => "co2_ppm",
            SensorField::Voc => "voc",
            SensorField::Pm25Ugm3 => "pm25_ugm3",
            SensorField::Ch2oPpm => "ch2o_ppm",
            SensorField::LightLux => "light_lux",
            SensorField::SoundDba => "sound_dBA",
            SensorField::OccupancyCount => "occupancy_count",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SensorField::TempC => "Temperature",
            SensorField::HumidityPct => "Humidity",
            SensorField::Co2Ppm => "CO₂ Level",
            SensorField::Voc => "VOC Index",
            SensorField::Pm25Ugm3 => "PM2.5",
            SensorField::Ch2oPpm => "Formaldehyde",
            SensorField::LightLux => "Light Intensity",
            SensorField::SoundDba => "Sound Level",
            SensorField::OccupancyCount => "Occupancy Count",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SensorField::TempC => "°C",
            SensorField::HumidityPct => "%",
            SensorField::Co2Ppm => "ppm",
            SensorField::Voc => "ppb",
            SensorField::Pm25Ugm3 => "µg/m³",
            SensorField::Ch2oPpm => "ppm",
            SensorField::LightLux => "lux",
            SensorField::SoundDba => "dBA",
            SensorField::OccupancyCount => "people",
        }
    }
}

impl FromStr for SensorField {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorField::ALL
            .into_iter()
            .find(|f| f.column() == s)
            .ok_or_else(|| crate::Error::Other(format!("unknown sensor field: {s}")))
    }
}

// ── Series ────────────────────────────────────────────────────────────

/// Time-ordered readings for one booth.
///
/// Clones share the same storage, so a series handed out by the cache stays
/// valid after the cache entry is replaced or evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    readings: Arc<[SensorReading]>,
}

impl Series {
    /// Wrap readings that are already in timestamp order.
    pub fn from_sorted(readings: Vec<SensorReading>) -> Self {
        Self {
            readings: readings.into(),
        }
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SensorReading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Most recent reading (last in order).
    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.last()
    }

    /// Readings whose timestamp falls inside `range`. Untimed readings never match.
    pub fn in_range<'a>(
        &'a self,
        range: &'a DateRange,
    ) -> impl Iterator<Item = &'a SensorReading> + 'a {
        self.readings
            .iter()
            .filter(move |r| r.timestamp.is_some_and(|ts| range.contains(ts)))
    }

    /// True when both handles point at the same underlying readings.
    pub fn shares_storage(&self, other: &Series) -> bool {
        Arc::ptr_eq(&self.readings, &other.readings)
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a SensorReading;
    type IntoIter = std::slice::Iter<'a, SensorReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// The `days`-day window ending at `now` (dashboard default is 30 days).
    pub fn last_days(now: NaiveDateTime, days: i64) -> Self {
        Self {
            start: now - Duration::days(days.saturating_sub(1).max(0)),
            end: now,
        }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }
}
