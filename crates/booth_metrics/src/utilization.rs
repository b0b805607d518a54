//! Booth utilization over a time window.

use common::{DateRange, Series};

/// Percent of in-range readings with a PIR state that report "Occupied".
///
/// Readings without a PIR state are ignored; 0 when none remain.
pub fn temporal_utilization(series: &Series, range: &DateRange) -> f64 {
    let (occupied, total) = series
        .in_range(range)
        .filter(|r| r.pir_state.is_some())
        .fold((0usize, 0usize), |(occupied, total), r| {
            (occupied + usize::from(r.is_occupied()), total + 1)
        });
    percent(occupied as f64, total)
}

/// Mean headcount of in-range readings with a positive count, as a percent
/// of `max_occupancy`. 0 when there are no such readings or no capacity.
pub fn capacity_utilization(series: &Series, range: &DateRange, max_occupancy: u32) -> f64 {
    if max_occupancy == 0 {
        return 0.0;
    }
    let (sum, n) = series
        .in_range(range)
        .filter_map(|r| r.occupancy_count)
        .filter(|&count| count > 0)
        .fold((0u64, 0usize), |(sum, n), count| (sum + u64::from(count), n + 1));
    if n == 0 {
        return 0.0;
    }
    let mean = sum as f64 / n as f64;
    mean / f64::from(max_occupancy) * 100.0
}

fn percent(part: f64, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part / total as f64 * 100.0
    }
}
