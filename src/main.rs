// Entry point and high-level CLI flow.
//
// - `report` loads metric records, classifies them, rolls them up by the
//   chosen dimension, prints previews and exports CSV/JSON files.
// - `auctions` loads benefit/auction items and prints their lifecycle state
//   and current leader.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use meta_report::auction::auction_rows;
use meta_report::config::ReportConfig;
use meta_report::reports::{classified_rows, rollup_rows};
use meta_report::types::Status;
use meta_report::{loader, output, util, GroupBy, PeriodSelector, ReportQuery};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meta-report")]
#[command(about = "Target vs. actual dashboards and auction status from exported data")]
struct Cli {
    /// TOML file with thresholds and output settings
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify metric records and roll them up by group
    Report {
        /// CSV export or JSON array of metric records
        #[arg(long, short = 'i')]
        input: PathBuf,

        #[arg(long, value_enum, default_value_t = GroupArg::Group)]
        group_by: GroupArg,

        /// Keep only records of this organizational unit / project
        #[arg(long)]
        scope: Option<String>,

        /// Reporting period (e.g. 2024-03), or "latest"
        #[arg(long)]
        period: Option<String>,

        /// Keep only this group (matched against the --group-by key)
        #[arg(long)]
        group: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Show lifecycle state and leading bid for auction items
    Auctions {
        /// JSON array of auction items with their bids
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Evaluate as of this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GroupArg {
    Group,
    Scope,
    Indicator,
    Period,
}

impl From<GroupArg> for GroupBy {
    fn from(g: GroupArg) -> Self {
        match g {
            GroupArg::Group => GroupBy::Group,
            GroupArg::Scope => GroupBy::Scope,
            GroupArg::Indicator => GroupBy::Indicator,
            GroupArg::Period => GroupBy::Period,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    OnTrack,
    AtRisk,
    Behind,
}

impl From<StatusArg> for Status {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::OnTrack => Status::OnTrack,
            StatusArg::AtRisk => Status::AtRisk,
            StatusArg::Behind => Status::Behind,
        }
    }
}

fn period_selector(period: Option<String>) -> PeriodSelector {
    match period {
        None => PeriodSelector::All,
        Some(p) if p.eq_ignore_ascii_case("latest") => PeriodSelector::Latest,
        Some(p) => PeriodSelector::Exact(p),
    }
}

fn handle_report(config: &ReportConfig, input: PathBuf, group_by: GroupBy, query: ReportQuery) -> Result<()> {
    let (records, load_report) = loader::load_metrics(&input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    println!(
        "Processing dataset... ({} rows read, {} records loaded)",
        util::format_int(load_report.total_rows),
        util::format_int(load_report.loaded_rows)
    );
    if load_report.skipped_rows > 0 {
        println!(
            "Note: {} rows skipped (missing indicator or unreadable).",
            util::format_int(load_report.skipped_rows)
        );
    }
    if load_report.defaulted_numbers > 0 {
        println!(
            "Info: {} missing values treated as 0.",
            util::format_int(load_report.defaulted_numbers)
        );
    }
    println!();

    let report = meta_report::run_report(&records, &query, group_by, &config.thresholds);
    let dir = &config.output.dir;
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let preview = config.output.preview_rows;

    let rows = classified_rows(&report.classified);
    let file1 = dir.join("classified_metrics.csv");
    output::write_csv(&file1, &rows)?;
    println!("Target vs. Actual by Indicator");
    if let Some(p) = &report.summary.period {
        println!("(Period: {})", p);
    }
    println!();
    output::preview_table_rows(&rows, preview);
    println!("(Full table exported to {})\n", file1.display());

    let rows = rollup_rows(&report.rollups);
    let file2 = dir.join("group_rollups.csv");
    output::write_csv(&file2, &rows)?;
    println!("Roll-up by {:?}", group_by);
    println!("(Primary records only, summed before dividing)\n");
    output::preview_table_rows(&rows, preview);
    println!("(Full table exported to {})\n", file2.display());

    output::write_json(
        dir.join("report.json"),
        &json!({
            "classified": report.classified,
            "rollups": report.rollups,
        }),
    )?;
    output::write_json(dir.join("summary.json"), &report.summary)?;
    let s = &report.summary;
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"target_sum\": {}, \"actual_sum\": {}, \"percent_of_target\": \"{}\", \"status\": \"{}\"}}",
        util::format_number(s.target_sum, 2),
        util::format_number(s.actual_sum, 2),
        util::format_percent(s.percent_of_target),
        s.status
    );
    println!(
        "On track: {}  At risk: {}  Behind: {}\n",
        s.on_track, s.at_risk, s.behind
    );
    info!(records = s.total_records, groups = s.total_groups, "report generated");
    Ok(())
}

fn handle_auctions(config: &ReportConfig, input: PathBuf, now: Option<String>) -> Result<()> {
    let now: DateTime<Utc> = match now {
        Some(text) => util::parse_datetime_safe(Some(text.as_str()))
            .with_context(|| format!("invalid --now timestamp: {}", text))?,
        None => Utc::now(),
    };
    let (items, load_report) = loader::load_auctions(&input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    if load_report.skipped_rows > 0 {
        println!(
            "Note: {} bids dropped due to unreadable timestamps.",
            util::format_int(load_report.skipped_rows)
        );
    }

    let rows = auction_rows(&items, now);
    let dir = &config.output.dir;
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let file = dir.join("auction_status.csv");
    output::write_csv(&file, &rows)?;
    println!("Auction / Benefit Status");
    println!("(As of {})\n", now.to_rfc3339());
    output::preview_table_rows(&rows, config.output.preview_rows);
    println!("(Full table exported to {})\n", file.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ReportConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ReportConfig::default(),
    };

    match cli.command {
        Command::Report {
            input,
            group_by,
            scope,
            period,
            group,
            status,
        } => {
            let query = ReportQuery {
                scope,
                period: period_selector(period),
                group_filter: group,
                status_filter: status.map(Status::from),
            };
            handle_report(&config, input, group_by.into(), query)
        }
        Command::Auctions { input, now } => handle_auctions(&config, input, now),
    }
}
