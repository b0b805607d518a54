//! Raw sheet rows → typed, time-ordered series.
//!
//! Never fails: a cell that does not parse becomes "no value" for that field
//! only, and the rest of the row is kept.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use common::{RawRow, RawValue, SensorField, SensorReading, Series};

const TIMESTAMP_FIELD: &str = "timestamp";
const PIR_FIELD: &str = "pir_state";

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Build a series from provider rows, sorted by timestamp with untimed rows
/// last. Rows with equal timestamps keep their arrival order.
pub fn normalize(rows: Vec<RawRow>) -> Series {
    let mut readings: Vec<SensorReading> = rows.iter().map(reading_from_row).collect();
    readings.sort_by(|a, b| compare_timestamps(a.timestamp, b.timestamp));
    Series::from_sorted(readings)
}

fn compare_timestamps(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn reading_from_row(row: &RawRow) -> SensorReading {
    let cell = |name: &str| row.get(name).and_then(Option::as_ref);
    let number = |field: SensorField| cell(field.column()).and_then(parse_number);

    SensorReading {
        timestamp: cell(TIMESTAMP_FIELD).and_then(parse_timestamp),
        temp_c: number(SensorField::TempC),
        humidity_pct: number(SensorField::HumidityPct),
        co2_ppm: number(SensorField::Co2Ppm),
        voc: number(SensorField::Voc),
        pm25_ugm3: number(SensorField::Pm25Ugm3),
        ch2o_ppm: number(SensorField::Ch2oPpm),
        light_lux: number(SensorField::LightLux),
        sound_dba: number(SensorField::SoundDba),
        occupancy_count: number(SensorField::OccupancyCount).and_then(to_count),
        pir_state: cell(PIR_FIELD).and_then(parse_text),
    }
}

fn parse_number(value: &RawValue) -> Option<f64> {
    let n = match value {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        RawValue::Bool(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn to_count(n: f64) -> Option<u32> {
    (n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

fn parse_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Text(s) if s.trim().is_empty() => None,
        RawValue::Text(s) => Some(s.clone()),
        RawValue::Number(n) => Some(n.to_string()),
        RawValue::Bool(b) => Some(b.to_string()),
    }
}

/// Parse the sheet's timestamp column. Offsets are folded into UTC.
pub fn parse_timestamp(value: &RawValue) -> Option<NaiveDateTime> {
    let RawValue::Text(raw) = value else {
        return None;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Option<RawValue>)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(s: &str) -> Option<RawValue> {
        Some(RawValue::Text(s.into()))
    }

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("valid test timestamp")
    }

    #[test]
    fn test_missing_and_garbled_fields_become_none() {
        let series = normalize(vec![row(&[
            ("timestamp", text("03/01/2025 10:00")),
            ("temp_c", text(" 21.5 ")),
            ("humidity_pct", text("n/a")),
            ("co2_ppm", text("")),
            ("voc", Some(RawValue::Bool(true))),
            ("pm25_ugm3", text("NaN")),
            ("occupancy_count", text("2.5")),
            ("pir_state", text("   ")),
        ])]);

        let r = &series.readings()[0];
        assert_eq!(r.timestamp, Some(ts("2025-03-01 10:00")));
        assert_eq!(r.temp_c, Some(21.5));
        assert_eq!(r.humidity_pct, None);
        assert_eq!(r.co2_ppm, None);
        assert_eq!(r.voc, None);
        assert_eq!(r.pm25_ugm3, None);
        assert_eq!(r.ch2o_ppm, None);
        assert_eq!(r.light_lux, None);
        assert_eq!(r.sound_dba, None);
        assert_eq!(r.occupancy_count, None);
        assert_eq!(r.pir_state, None);
    }

    #[test]
    fn test_numeric_cells_and_counts() {
        let series = normalize(vec![row(&[
            ("co2_ppm", Some(RawValue::Number(640.0))),
            ("sound_dBA", text("42")),
            ("occupancy_count", Some(RawValue::Number(3.0))),
            ("pir_state", text("occupied ")),
        ])]);

        let r = &series.readings()[0];
        assert_eq!(r.co2_ppm, Some(640.0));
        assert_eq!(r.sound_dba, Some(42.0));
        assert_eq!(r.occupancy_count, Some(3));
        assert_eq!(r.pir_state.as_deref(), Some("occupied "));
        assert!(r.is_occupied());
    }

    #[test]
    fn test_negative_count_is_dropped() {
        let series = normalize(vec![row(&[("occupancy_count", text("-1"))])]);
        assert_eq!(series.readings()[0].occupancy_count, None);
    }

    #[test]
    fn test_sorted_with_untimed_last_and_stable_ties() {
        let series = normalize(vec![
            row(&[("timestamp", text("garbage")), ("temp_c", text("1"))]),
            row(&[("timestamp", text("2025-03-01 12:00")), ("temp_c", text("2"))]),
            row(&[("timestamp", text("2025-03-01 09:00")), ("temp_c", text("3"))]),
            row(&[("timestamp", text("2025-03-01 12:00")), ("temp_c", text("4"))]),
            row(&[("temp_c", text("5"))]),
        ]);

        let temps: Vec<Option<f64>> = series.iter().map(|r| r.temp_c).collect();
        assert_eq!(
            temps,
            vec![Some(3.0), Some(2.0), Some(4.0), Some(1.0), Some(5.0)]
        );
        let timed: Vec<_> = series.iter().filter_map(|r| r.timestamp).collect();
        assert!(timed.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = ts("2025-03-01 10:30");
        for raw in [
            "2025-03-01 10:30",
            "2025-03-01 10:30:00",
            "2025-03-01T10:30:00",
            "03/01/2025 10:30",
            "2025-03-01T10:30:00Z",
            "2025-03-01T12:30:00+02:00",
        ] {
            assert_eq!(
                parse_timestamp(&RawValue::Text(raw.into())),
                Some(expected),
                "{raw}"
            );
        }
        assert_eq!(
            parse_timestamp(&RawValue::Text("2025-03-01".into())),
            Some(ts("2025-03-01 00:00"))
        );
        assert_eq!(parse_timestamp(&RawValue::Number(45000.0)), None);
    }

    #[test]
    fn test_empty_input_gives_empty_series() {
        assert!(normalize(Vec::new()).is_empty());
    }
}
