//! Simulated sheet source for local runs without remote credentials.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use common::{CacheKey, RawRow, RawValue};
use rand::Rng;

use crate::provider::{ProviderError, SeriesProvider};

const HOURS: i64 = 24;
const SHEET_TIME_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Generates a day of hourly readings for any key.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider;

impl SimulatedProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SeriesProvider for SimulatedProvider {
    async fn fetch(&self, _key: &CacheKey) -> Result<Vec<RawRow>, ProviderError> {
        let now = Local::now().naive_local();
        Ok(simulated_rows(now))
    }
}

/// Hourly rows for the `HOURS` hours ending at `now`, as text cells.
pub fn simulated_rows(now: NaiveDateTime) -> Vec<RawRow> {
    let mut rng = rand::thread_rng();
    let end = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    (0..HOURS)
        .rev()
        .map(|back| {
            let ts = end - Duration::hours(back);
            let occupied = rng.gen_bool(0.3);
            let cells: [(&str, String); 11] = [
                ("timestamp", ts.format(SHEET_TIME_FORMAT).to_string()),
                ("temp_c", format!("{:.1}", rng.gen_range(19.0..25.0))),
                ("humidity_pct", format!("{:.1}", rng.gen_range(35.0..55.0))),
                ("co2_ppm", format!("{:.0}", rng.gen_range(600.0..1000.0))),
                ("voc", format!("{:.0}", rng.gen_range(100.0..300.0))),
                ("pm25_ugm3", format!("{:.1}", rng.gen_range(5.0..25.0))),
                ("ch2o_ppm", format!("{:.3}", rng.gen_range(0.03..0.07))),
                ("light_lux", format!("{:.0}", rng.gen_range(250.0..550.0))),
                ("sound_dBA", format!("{:.1}", rng.gen_range(30.0..60.0))),
                ("occupancy_count", rng.gen_range(0..5u32).to_string()),
                (
                    "pir_state",
                    if occupied { "Occupied" } else { "Vacant" }.to_string(),
                ),
            ];
            cells
                .into_iter()
                .map(|(field, text)| (field.to_string(), Some(RawValue::Text(text))))
                .collect()
        })
        .collect()
}
