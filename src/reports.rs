// Target vs. actual aggregation and status classification.
//
// Everything here is pure: records in, derived values out. Percentages are
// never rounded; that is left to the presentation rows built at the bottom
// of this module.

use crate::types::{
    ClassifiedMetric, ClassifiedRow, GroupRollup, MetricRecord, RollupRow, Status, SummaryStats,
    UNASSIGNED,
};
use crate::util::{average, format_number, format_percent, latest_period};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_ON_TRACK: f64 = 100.0;
pub const DEFAULT_AT_RISK: f64 = 80.0;

/// Percent of target achieved.
///
/// A target of zero or less means "nothing to measure against" and yields
/// `0`. The result is always finite: quotients that overflow saturate at
/// `±f64::MAX`.
pub fn percent_of_target(target: f64, actual: f64) -> f64 {
    if target.is_nan() || target <= 0.0 {
        return 0.0;
    }
    let pct = (actual / target) * 100.0;
    if pct.is_finite() {
        pct
    } else if pct.is_nan() {
        0.0
    } else {
        f64::MAX.copysign(pct)
    }
}

/// Status cut-offs, in percent of target.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// At or above this the metric is on track.
    pub on_track: f64,
    /// At or above this (and below `on_track`) the metric is at risk.
    pub at_risk: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            on_track: DEFAULT_ON_TRACK,
            at_risk: DEFAULT_AT_RISK,
        }
    }
}

impl Thresholds {
    pub fn classify(&self, percent_of_target: f64) -> Status {
        if percent_of_target >= self.on_track {
            Status::OnTrack
        } else if percent_of_target >= self.at_risk {
            Status::AtRisk
        } else {
            Status::Behind
        }
    }
}

/// Classify with the shared dashboard thresholds (100 / 80).
pub fn classify(percent_of_target: f64) -> Status {
    Thresholds::default().classify(percent_of_target)
}

pub fn classify_records(records: &[MetricRecord], thresholds: &Thresholds) -> Vec<ClassifiedMetric> {
    records
        .iter()
        .map(|r| {
            let pct = percent_of_target(r.target, r.actual);
            ClassifiedMetric {
                record: r.clone(),
                percent_of_target: pct,
                status: thresholds.classify(pct),
            }
        })
        .collect()
}

/// Roll records up by an arbitrary key, counting only those `is_primary`
/// accepts.
///
/// Groups come out in first-seen order. The group percent is computed from
/// the summed target and actual, never by averaging member percents.
pub fn rollup_with<K, P>(
    records: &[MetricRecord],
    key: K,
    is_primary: P,
    thresholds: &Thresholds,
) -> Vec<GroupRollup>
where
    K: Fn(&MetricRecord) -> &str,
    P: Fn(&MetricRecord) -> bool,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut sums: Vec<(String, f64, f64)> = Vec::new();
    for r in records.iter().filter(|&r| is_primary(r)) {
        let k = key(r);
        let slot = match index.get(k) {
            Some(&i) => i,
            None => {
                index.insert(k.to_string(), sums.len());
                sums.push((k.to_string(), 0.0, 0.0));
                sums.len() - 1
            }
        };
        sums[slot].1 += r.target;
        sums[slot].2 += r.actual;
    }
    sums.into_iter()
        .map(|(group_key, target_sum, actual_sum)| {
            let pct = percent_of_target(target_sum, actual_sum);
            GroupRollup {
                group_key,
                target_sum,
                actual_sum,
                percent_of_target: pct,
                status: thresholds.classify(pct),
            }
        })
        .collect()
}

pub fn rollup_by<K>(records: &[MetricRecord], key: K, thresholds: &Thresholds) -> Vec<GroupRollup>
where
    K: Fn(&MetricRecord) -> &str,
{
    rollup_with(records, key, |r| r.is_primary, thresholds)
}

pub fn rollup(records: &[MetricRecord], thresholds: &Thresholds) -> Vec<GroupRollup> {
    rollup_by(records, |r| r.group_key.as_str(), thresholds)
}

/// Named grouping dimensions for callers that pick one at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Group,
    Scope,
    Indicator,
    Period,
}

impl GroupBy {
    pub fn key<'a>(&self, r: &'a MetricRecord) -> &'a str {
        match self {
            GroupBy::Group => &r.group_key,
            GroupBy::Scope => r.scope.as_deref().unwrap_or(UNASSIGNED),
            GroupBy::Indicator => &r.indicator_name,
            GroupBy::Period => r.period.as_deref().unwrap_or(UNASSIGNED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PeriodSelector {
    #[default]
    All,
    Exact(String),
    /// Most recent period that has any reported actual.
    Latest,
}

/// What a dashboard panel asks for. Passed in explicitly; the engine keeps
/// no state between calls.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub scope: Option<String>,
    pub period: PeriodSelector,
    pub group_filter: Option<String>,
    pub status_filter: Option<Status>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub classified: Vec<ClassifiedMetric>,
    pub rollups: Vec<GroupRollup>,
    pub summary: SummaryStats,
}

pub fn run_report(
    records: &[MetricRecord],
    query: &ReportQuery,
    group_by: GroupBy,
    thresholds: &Thresholds,
) -> Report {
    let scoped: Vec<&MetricRecord> = records
        .iter()
        .filter(|r| match &query.scope {
            Some(s) => r.scope.as_deref() == Some(s.as_str()),
            None => true,
        })
        .collect();
    let period = match &query.period {
        PeriodSelector::All => None,
        PeriodSelector::Exact(p) => Some(p.clone()),
        PeriodSelector::Latest => latest_period(scoped.iter().copied()),
    };
    let selected: Vec<MetricRecord> = scoped
        .into_iter()
        .filter(|r| match &period {
            Some(p) => r.period.as_deref() == Some(p.as_str()),
            None => true,
        })
        .filter(|r| match &query.group_filter {
            Some(g) => group_by.key(r) == g.as_str(),
            None => true,
        })
        .cloned()
        .collect();
    debug!(
        total = records.len(),
        selected = selected.len(),
        period = ?period,
        "applied report query"
    );

    let mut classified = classify_records(&selected, thresholds);
    let mut rollups = rollup_by(&selected, |r| group_by.key(r), thresholds);
    let summary = generate_summary(&classified, &rollups, thresholds, period);

    if let Some(status) = query.status_filter {
        classified.retain(|c| c.status == status);
        rollups.retain(|g| g.status == status);
    }

    Report {
        classified,
        rollups,
        summary,
    }
}

/// Dashboard card values over an already-classified selection.
pub fn generate_summary(
    classified: &[ClassifiedMetric],
    rollups: &[GroupRollup],
    thresholds: &Thresholds,
    period: Option<String>,
) -> SummaryStats {
    let primary: Vec<&ClassifiedMetric> = classified.iter().filter(|c| c.record.is_primary).collect();
    let target_sum: f64 = primary.iter().map(|c| c.record.target).sum();
    let actual_sum: f64 = primary.iter().map(|c| c.record.actual).sum();
    let pct = percent_of_target(target_sum, actual_sum);
    let count = |s: Status| classified.iter().filter(|c| c.status == s).count();
    let percents: Vec<f64> = classified.iter().map(|c| c.percent_of_target).collect();
    SummaryStats {
        total_records: classified.len(),
        primary_records: primary.len(),
        total_groups: rollups.len(),
        target_sum,
        actual_sum,
        percent_of_target: pct,
        status: thresholds.classify(pct),
        on_track: count(Status::OnTrack),
        at_risk: count(Status::AtRisk),
        behind: count(Status::Behind),
        avg_record_percent: average(&percents),
        period,
    }
}

pub fn classified_rows(classified: &[ClassifiedMetric]) -> Vec<ClassifiedRow> {
    classified
        .iter()
        .map(|c| ClassifiedRow {
            indicator: c.record.indicator_name.clone(),
            group: c.record.group_key.clone(),
            primary: if c.record.is_primary { "Yes" } else { "No" }.to_string(),
            target: format_number(c.record.target, 2),
            actual: format_number(c.record.actual, 2),
            percent_of_target: format_percent(c.percent_of_target),
            status: c.status.to_string(),
        })
        .collect()
}

pub fn rollup_rows(rollups: &[GroupRollup]) -> Vec<RollupRow> {
    rollups
        .iter()
        .map(|g| RollupRow {
            group: g.group_key.clone(),
            target_sum: format_number(g.target_sum, 2),
            actual_sum: format_number(g.actual_sum, 2),
            percent_of_target: format_percent(g.percent_of_target),
            status: g.status.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(group: &str, primary: bool, target: f64, actual: f64) -> MetricRecord {
        MetricRecord::new("indicator", group, primary, target, actual)
    }

    #[test]
    fn zero_or_negative_target_is_zero_percent() {
        assert_eq!(percent_of_target(0.0, 500.0), 0.0);
        assert_eq!(percent_of_target(-10.0, 5.0), 0.0);
        assert_eq!(percent_of_target(200.0, 50.0), 25.0);
    }

    #[test]
    fn percent_saturates_instead_of_overflowing() {
        let pct = percent_of_target(f64::MIN_POSITIVE, f64::MAX);
        assert_eq!(pct, f64::MAX);
        let pct = percent_of_target(f64::MIN_POSITIVE, -f64::MAX);
        assert_eq!(pct, -f64::MAX);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(100.0), Status::OnTrack);
        assert_eq!(classify(99.999), Status::AtRisk);
        assert_eq!(classify(80.0), Status::AtRisk);
        assert_eq!(classify(79.999), Status::Behind);
        assert_eq!(classify(0.0), Status::Behind);
        assert_eq!(classify(150.0), Status::OnTrack);
        assert_eq!(classify(-20.0), Status::Behind);
    }

    #[test]
    fn custom_thresholds_move_the_cutoffs() {
        let t = Thresholds {
            on_track: 90.0,
            at_risk: 50.0,
        };
        assert_eq!(t.classify(90.0), Status::OnTrack);
        assert_eq!(t.classify(60.0), Status::AtRisk);
        assert_eq!(t.classify(49.9), Status::Behind);
    }

    #[test]
    fn classify_records_keeps_order_and_fields() {
        let input = vec![rec("A", true, 100.0, 120.0), rec("B", false, 0.0, 3.0), rec("C", true, 10.0, 8.5)];
        let out = classify_records(&input, &Thresholds::default());
        assert_eq!(out.len(), 3);
        for (c, r) in out.iter().zip(&input) {
            assert_eq!(&c.record, r);
        }
        assert_eq!(out[0].status, Status::OnTrack);
        assert_eq!(out[1].percent_of_target, 0.0);
        assert_eq!(out[1].status, Status::Behind);
        assert_eq!(out[2].status, Status::AtRisk);
        assert!(classify_records(&[], &Thresholds::default()).is_empty());
    }

    #[test]
    fn rollup_ignores_non_primary_records() {
        let input = vec![rec("A", true, 100.0, 50.0), rec("A", false, 9999.0, 9999.0)];
        let out = rollup(&input, &Thresholds::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].group_key, "A");
        assert_eq!(out[0].target_sum, 100.0);
        assert_eq!(out[0].actual_sum, 50.0);
        assert_eq!(out[0].percent_of_target, 50.0);
        assert_eq!(out[0].status, Status::Behind);
    }

    #[test]
    fn rollup_sums_before_dividing() {
        let input = vec![rec("B", true, 1000.0, 1000.0), rec("B", true, 10.0, 0.0)];
        let out = rollup(&input, &Thresholds::default());
        let expected = 1000.0 / 1010.0 * 100.0;
        assert!((out[0].percent_of_target - expected).abs() < 1e-9);
        assert!((out[0].percent_of_target - 99.0).abs() < 0.01);
        assert_eq!(out[0].status, Status::AtRisk);
    }

    #[test]
    fn rollup_omits_groups_without_primary_records_and_keeps_first_seen_order() {
        let input = vec![
            rec("zeta", true, 10.0, 10.0),
            rec("ghost", false, 10.0, 10.0),
            rec("alpha", true, 10.0, 1.0),
            rec("zeta", true, 10.0, 10.0),
        ];
        let out = rollup(&input, &Thresholds::default());
        let keys: Vec<&str> = out.iter().map(|g| g.group_key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(out[0].target_sum, 20.0);
    }

    #[test]
    fn unbudgeted_spending_group_is_behind() {
        let input = vec![rec("extra", true, 0.0, 500.0)];
        let out = rollup(&input, &Thresholds::default());
        assert_eq!(out[0].percent_of_target, 0.0);
        assert_eq!(out[0].status, Status::Behind);
    }

    #[test]
    fn rollup_with_custom_key_and_predicate() {
        let input = vec![
            rec("A", false, 10.0, 10.0).with_scope("north"),
            rec("B", false, 30.0, 0.0).with_scope("north"),
            rec("C", false, 5.0, 5.0),
        ];
        let out = rollup_with(&input, |r| GroupBy::Scope.key(r), |_| true, &Thresholds::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].group_key, "north");
        assert_eq!(out[0].target_sum, 40.0);
        assert_eq!(out[1].group_key, UNASSIGNED);
    }

    #[test]
    fn run_report_applies_query() {
        let records = vec![
            rec("A", true, 100.0, 100.0).with_scope("sp").with_period("2024-01"),
            rec("A", true, 100.0, 50.0).with_scope("sp").with_period("2024-02"),
            rec("B", true, 100.0, 90.0).with_scope("sp").with_period("2024-02"),
            rec("B", true, 100.0, 0.0).with_scope("sp").with_period("2024-03"),
            rec("C", true, 100.0, 100.0).with_scope("rj").with_period("2024-02"),
        ];
        let query = ReportQuery {
            scope: Some("sp".into()),
            period: PeriodSelector::Latest,
            ..Default::default()
        };
        let report = run_report(&records, &query, GroupBy::Group, &Thresholds::default());
        assert_eq!(report.summary.period.as_deref(), Some("2024-02"));
        assert_eq!(report.classified.len(), 2);
        assert_eq!(report.rollups.len(), 2);
        assert_eq!(report.summary.target_sum, 200.0);
        assert_eq!(report.summary.actual_sum, 140.0);
        assert_eq!(report.summary.status, Status::Behind);
    }

    #[test]
    fn latest_without_reported_actuals_selects_one_snapshot() {
        let records = vec![
            rec("A", true, 100.0, 0.0).with_period("2024-01"),
            rec("A", true, 100.0, 0.0).with_period("2024-02"),
            rec("A", true, 100.0, 0.0).with_period("2024-03"),
        ];
        let query = ReportQuery {
            period: PeriodSelector::Latest,
            ..Default::default()
        };
        let report = run_report(&records, &query, GroupBy::Group, &Thresholds::default());
        assert_eq!(report.summary.period.as_deref(), Some("2024-03"));
        assert_eq!(report.classified.len(), 1);
        assert_eq!(report.summary.target_sum, 100.0);
    }

    #[test]
    fn status_filter_does_not_change_sums() {
        let records = vec![rec("A", true, 100.0, 100.0), rec("A", true, 100.0, 10.0), rec("B", true, 10.0, 1.0)];
        let query = ReportQuery {
            status_filter: Some(Status::Behind),
            ..Default::default()
        };
        let report = run_report(&records, &query, GroupBy::Group, &Thresholds::default());
        assert_eq!(report.classified.len(), 2);
        assert!(report.classified.iter().all(|c| c.status == Status::Behind));
        // A is 110/200 = 55% -> behind, B is 10% -> behind.
        assert_eq!(report.rollups.len(), 2);
        assert_eq!(report.rollups[0].target_sum, 200.0);
        assert_eq!(report.summary.total_records, 3);
        assert_eq!(report.summary.on_track, 1);
    }

    #[test]
    fn empty_input_gives_empty_report() {
        let report = run_report(&[], &ReportQuery::default(), GroupBy::Group, &Thresholds::default());
        assert!(report.classified.is_empty());
        assert!(report.rollups.is_empty());
        assert_eq!(report.summary.percent_of_target, 0.0);
        assert_eq!(report.summary.avg_record_percent, 0.0);
    }

    #[test]
    fn presentation_rows_round_to_one_decimal() {
        let input = vec![rec("B", true, 1010.0, 1000.0)];
        let rows = rollup_rows(&rollup(&input, &Thresholds::default()));
        assert_eq!(rows[0].percent_of_target, "99.0%");
        assert_eq!(rows[0].target_sum, "1,010.00");
        assert_eq!(rows[0].status, "At risk");
        let rows = classified_rows(&classify_records(&input, &Thresholds::default()));
        assert_eq!(rows[0].primary, "Yes");
    }

    fn finite() -> impl Strategy<Value = f64> {
        any::<f64>().prop_filter("finite", |v| v.is_finite())
    }

    proptest! {
        #[test]
        fn prop_percent_is_always_finite(target in finite(), actual in finite()) {
            let pct = percent_of_target(target, actual);
            prop_assert!(pct.is_finite());
        }

        #[test]
        fn prop_zero_target_is_zero(actual in finite()) {
            prop_assert_eq!(percent_of_target(0.0, actual), 0.0);
        }

        #[test]
        fn prop_batch_preserves_length(values in proptest::collection::vec((0.0..1e6f64, 0.0..1e6f64, any::<bool>()), 0..50)) {
            let records: Vec<MetricRecord> = values
                .iter()
                .enumerate()
                .map(|(i, (t, a, p))| MetricRecord::new(&format!("i{}", i), "g", *p, *t, *a))
                .collect();
            let out = classify_records(&records, &Thresholds::default());
            prop_assert_eq!(out.len(), records.len());
            for (c, r) in out.iter().zip(&records) {
                prop_assert_eq!(&c.record.indicator_name, &r.indicator_name);
            }
        }
    }
}
