use crate::error::Result;
use crate::types::{AuctionItem, Bid, MetricRecord, RawAuctionItem, RawMetricJson, RawMetricRow, UNASSIGNED};
use crate::util::{json_to_text, parse_bool_safe, parse_datetime_safe, parse_f64_safe};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_rows: usize,
    pub defaulted_numbers: usize,
}

/// Load metric records from a CSV export or a JSON array (`.json`).
pub fn load_metrics(path: impl AsRef<Path>) -> Result<(Vec<MetricRecord>, LoadReport)> {
    let path = path.as_ref();
    let rows = if is_json(path) {
        let reader = BufReader::new(File::open(path)?);
        let raw: Vec<RawMetricJson> = serde_json::from_reader(reader)?;
        raw.iter().map(json_row_to_raw).map(Ok).collect::<Vec<Result<RawMetricRow>>>()
    } else {
        let mut rdr = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_path(path)?;
        rdr.deserialize::<RawMetricRow>()
            .map(|r| r.map_err(Into::into))
            .collect::<Vec<Result<RawMetricRow>>>()
    };

    let mut report = LoadReport::default();
    let mut records = Vec::with_capacity(rows.len());
    for (line, row) in rows.into_iter().enumerate() {
        report.total_rows += 1;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!(row = line + 1, error = %e, "skipping unreadable row");
                report.skipped_rows += 1;
                continue;
            }
        };
        match clean_metric(row, line + 1, &mut report) {
            Some(rec) => records.push(rec),
            None => report.skipped_rows += 1,
        }
    }
    report.loaded_rows = records.len();
    info!(
        path = %path.display(),
        loaded = report.loaded_rows,
        skipped = report.skipped_rows,
        defaulted = report.defaulted_numbers,
        "loaded metric records"
    );
    Ok((records, report))
}

/// Turn one raw row into a `MetricRecord`. Missing numbers become `0`;
/// a row without an indicator name cannot be shown and is dropped.
pub fn clean_metric(row: RawMetricRow, line: usize, report: &mut LoadReport) -> Option<MetricRecord> {
    let indicator_name = match non_empty(row.indicator) {
        Some(name) => name,
        None => {
            warn!(row = line, "skipping row without indicator name");
            return None;
        }
    };
    let mut number = |field: &str, raw: Option<String>| {
        let parsed = parse_f64_safe(raw.as_deref());
        if let Some(v) = parsed {
            return v;
        }
        match non_empty(raw) {
            Some(text) => warn!(row = line, field, value = %text, "unreadable number, using 0"),
            None => debug!(row = line, field, "missing number, using 0"),
        }
        report.defaulted_numbers += 1;
        0.0
    };
    let target = number("target", row.target);
    let actual = number("actual", row.actual);
    Some(MetricRecord {
        indicator_name,
        group_key: non_empty(row.group).unwrap_or_else(|| UNASSIGNED.to_string()),
        scope: non_empty(row.scope),
        period: non_empty(row.period),
        is_primary: parse_bool_safe(row.primary.as_deref()).unwrap_or(true),
        target,
        actual,
    })
}

fn json_row_to_raw(row: &RawMetricJson) -> RawMetricRow {
    RawMetricRow {
        indicator: json_to_text(row.indicator_name.as_ref()),
        group: json_to_text(row.group_key.as_ref()),
        scope: json_to_text(row.scope.as_ref()),
        period: json_to_text(row.period.as_ref()),
        primary: json_to_text(row.is_primary.as_ref()),
        target: json_to_text(row.target.as_ref()),
        actual: json_to_text(row.actual.as_ref()),
    }
}

/// Load auction items (with their bids) from a JSON array.
pub fn load_auctions(path: impl AsRef<Path>) -> Result<(Vec<AuctionItem>, LoadReport)> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let raw: Vec<RawAuctionItem> = serde_json::from_reader(reader)?;
    let mut report = LoadReport::default();
    let items: Vec<AuctionItem> = raw
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            report.total_rows += 1;
            clean_auction(item, idx + 1, &mut report)
        })
        .collect();
    report.loaded_rows = items.len();
    info!(
        path = %path.display(),
        items = items.len(),
        dropped_bids = report.skipped_rows,
        "loaded auction items"
    );
    Ok((items, report))
}

fn clean_auction(item: RawAuctionItem, line: usize, report: &mut LoadReport) -> AuctionItem {
    let name = non_empty(item.name).unwrap_or_else(|| format!("Item {}", line));
    let enabled = json_to_text(item.enabled.as_ref())
        .and_then(|t| parse_bool_safe(Some(t.as_str())))
        .unwrap_or(false);
    let mut bids = Vec::with_capacity(item.bids.len());
    for raw in item.bids {
        let Some(bid_timestamp) = parse_datetime_safe(raw.bid_timestamp.as_deref()) else {
            warn!(item = %name, value = ?raw.bid_timestamp, "dropping bid with unreadable timestamp");
            report.skipped_rows += 1;
            continue;
        };
        let amount_text = json_to_text(raw.offered_amount.as_ref());
        let offered_amount = match parse_f64_safe(amount_text.as_deref()) {
            Some(v) => v,
            None => {
                debug!(item = %name, value = ?amount_text, "defaulting bid amount to 0");
                report.defaulted_numbers += 1;
                0.0
            }
        };
        bids.push(Bid {
            bidder: non_empty(raw.bidder).unwrap_or_else(|| "Anonymous".to_string()),
            offered_amount,
            bid_timestamp,
        });
    }
    AuctionItem {
        name,
        enabled,
        start_time: parse_datetime_safe(item.start_time.as_deref()),
        deadline: parse_datetime_safe(item.deadline.as_deref()),
        bids,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
