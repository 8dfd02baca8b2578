use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Group label used when a record carries no value for the chosen dimension.
pub const UNASSIGNED: &str = "Unassigned";

/// One CSV row exactly as exported by the "meta vs realizado" endpoint.
/// Every column is optional text; cleaning happens in `loader`.
#[derive(Debug, Deserialize)]
pub struct RawMetricRow {
    #[serde(rename = "Indicator")]
    pub indicator: Option<String>,
    #[serde(rename = "Group")]
    pub group: Option<String>,
    #[serde(rename = "Scope")]
    pub scope: Option<String>,
    #[serde(rename = "Period")]
    pub period: Option<String>,
    #[serde(rename = "Primary")]
    pub primary: Option<String>,
    #[serde(rename = "Target")]
    pub target: Option<String>,
    #[serde(rename = "Actual")]
    pub actual: Option<String>,
}

/// The same row as it arrives from the JSON API. Values are loosely typed:
/// numbers show up as numbers or numeric-looking strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetricJson {
    #[serde(default, alias = "indicator")]
    pub indicator_name: Option<serde_json::Value>,
    #[serde(default, alias = "group")]
    pub group_key: Option<serde_json::Value>,
    #[serde(default)]
    pub scope: Option<serde_json::Value>,
    #[serde(default)]
    pub period: Option<serde_json::Value>,
    #[serde(default, alias = "primary")]
    pub is_primary: Option<serde_json::Value>,
    #[serde(default, alias = "meta")]
    pub target: Option<serde_json::Value>,
    #[serde(default, alias = "realizado")]
    pub actual: Option<serde_json::Value>,
}

/// A validated metric record. Numbers are already coerced to `0` when
/// missing, so the engine can assume total inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub indicator_name: String,
    pub group_key: String,
    pub scope: Option<String>,
    pub period: Option<String>,
    pub is_primary: bool,
    pub target: f64,
    pub actual: f64,
}

impl MetricRecord {
    pub fn new(indicator_name: &str, group_key: &str, is_primary: bool, target: f64, actual: f64) -> Self {
        Self {
            indicator_name: indicator_name.to_string(),
            group_key: group_key.to_string(),
            scope: None,
            period: None,
            is_primary,
            target,
            actual,
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_period(mut self, period: &str) -> Self {
        self.period = Some(period.to_string());
        self
    }
}

/// Traffic-light status of a percent-of-target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    OnTrack,
    AtRisk,
    Behind,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::OnTrack => "On track",
            Status::AtRisk => "At risk",
            Status::Behind => "Behind",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedMetric {
    #[serde(flatten)]
    pub record: MetricRecord,
    pub percent_of_target: f64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRollup {
    pub group_key: String,
    pub target_sum: f64,
    pub actual_sum: f64,
    pub percent_of_target: f64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub primary_records: usize,
    pub total_groups: usize,
    pub target_sum: f64,
    pub actual_sum: f64,
    pub percent_of_target: f64,
    pub status: Status,
    pub on_track: usize,
    pub at_risk: usize,
    pub behind: usize,
    /// Mean of per-record percents. Informational only; the headline
    /// percent above is sum-then-divide.
    pub avg_record_percent: f64,
    pub period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ClassifiedRow {
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Primary")]
    #[tabled(rename = "Primary")]
    pub primary: String,
    #[serde(rename = "Target")]
    #[tabled(rename = "Target")]
    pub target: String,
    #[serde(rename = "Actual")]
    #[tabled(rename = "Actual")]
    pub actual: String,
    #[serde(rename = "PercentOfTarget")]
    #[tabled(rename = "PercentOfTarget")]
    pub percent_of_target: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RollupRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "TargetSum")]
    #[tabled(rename = "TargetSum")]
    pub target_sum: String,
    #[serde(rename = "ActualSum")]
    #[tabled(rename = "ActualSum")]
    pub actual_sum: String,
    #[serde(rename = "PercentOfTarget")]
    #[tabled(rename = "PercentOfTarget")]
    pub percent_of_target: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}

// ---------------------------------------------------------------------------
// Auctions / benefits
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuctionItem {
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<serde_json::Value>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub bids: Vec<RawBid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBid {
    #[serde(default, alias = "user")]
    pub bidder: Option<String>,
    #[serde(default, alias = "amount")]
    pub offered_amount: Option<serde_json::Value>,
    #[serde(default, alias = "createdAt")]
    pub bid_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    pub bidder: String,
    pub offered_amount: f64,
    pub bid_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuctionItem {
    pub name: String,
    pub enabled: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub bids: Vec<Bid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Inactive,
    Awaiting,
    Active,
    Expired,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Inactive => "Inactive",
            LifecycleState::Awaiting => "Awaiting",
            LifecycleState::Active => "Active",
            LifecycleState::Expired => "Expired",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct AuctionRow {
    #[serde(rename = "Item")]
    #[tabled(rename = "Item")]
    pub item: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Bids")]
    #[tabled(rename = "Bids")]
    pub bids: usize,
    #[serde(rename = "Leader")]
    #[tabled(rename = "Leader")]
    pub leader: String,
    #[serde(rename = "LeadingBid")]
    #[tabled(rename = "LeadingBid")]
    pub leading_bid: String,
}
