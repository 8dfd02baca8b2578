// Target vs. actual ("meta x realizado") reporting for membership and
// fundraising dashboards, plus auction/benefit lifecycle helpers.
//
// Records are validated once at the boundary (`loader`), classified and
// rolled up by the pure engine (`reports`, `auction`), and rendered by
// `output`.

pub mod auction;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
pub use reports::{
    classify, classify_records, percent_of_target, rollup, rollup_by, rollup_with, run_report,
    GroupBy, PeriodSelector, Report, ReportQuery, Thresholds,
};
pub use types::{ClassifiedMetric, GroupRollup, MetricRecord, Status};
