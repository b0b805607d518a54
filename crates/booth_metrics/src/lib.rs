//! Pure metrics over normalized booth series: comfort scores, utilization,
//! the hourly comfort trend and the dashboard roll-ups built on them.

pub mod comfort;
pub mod dashboard;
pub mod hourly;
pub mod utilization;

pub use comfort::{comfort_score, score_environment, EnvironmentSample};
pub use dashboard::{
    alerts, booth_performance, booth_status, metric_summary, portfolio_summary, Alert,
    BoothPerformance, BoothStatus, DailyMean, LocationPerformance, MetricSummary,
    PortfolioSummary,
};
pub use hourly::{
    average_comfort, hourly_portfolio_comfort, score_hours, trend_window, HourlyComfort, TREND_HOURS,
};
pub use utilization::{capacity_utilization, temporal_utilization};
