//! End-to-end clearing run: load inputs, clear, aggregate.

use crate::config::AppConfig;
use crate::core::calendar::BusinessCalendar;
use crate::core::ledger_row::{read_ledger_file, LedgerExport, LedgerRow};
use crate::core::store::OpenItemStore;
use crate::engine::clearing::ClearingEngine;
use crate::error::Result;
use crate::report::aggregate::{ClearingRunResult, ResultAggregator};
use crate::report::org_chart::OrgChart;
use crate::rules::rule_set::RuleSet;
use chrono::NaiveDate;
use log::info;
use std::path::PathBuf;

/// Overrides for a configured run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub as_of: NaiveDate,
    pub ledger_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            ledger_path: None,
            rules_path: None,
        }
    }
}

/// Run a complete clearing from the application configuration.
///
/// Rules and calendar are loaded before any ledger row is read; a
/// failure in either aborts the run.
pub fn run_from_config(config: &AppConfig, options: &RunOptions) -> Result<ClearingRunResult> {
    let rules_path = options
        .rules_path
        .as_ref()
        .unwrap_or(&config.clearing.rules_path);
    let rules = RuleSet::load_file(rules_path)?;
    let calendar = config.calendar()?;
    info!(
        "Calendar loaded with {} holiday entries",
        calendar.holiday_count()
    );

    let ledger_path = options.ledger_path.as_ref().unwrap_or(&config.ledger.path);
    let export = read_ledger_file(ledger_path)?;
    info!("Read {} ledger rows from {}", export.len(), ledger_path.display());

    clear_export(
        &export,
        &rules,
        &calendar,
        &config.org_chart(),
        options.as_of,
        config.clearing.max_workers,
    )
}

/// Clear already loaded ledger rows.
///
/// With `max_workers` set, scopes run on a dedicated pool of that size.
pub fn clear(
    rows: &[LedgerRow],
    rules: &RuleSet,
    calendar: &BusinessCalendar,
    org_chart: &OrgChart,
    as_of: NaiveDate,
    max_workers: Option<usize>,
) -> Result<ClearingRunResult> {
    let store = OpenItemStore::load_lenient(rows);
    clear_store(&store, rules, calendar, org_chart, as_of, max_workers)
}

/// Clear a CSV export. Lines that did not decode taint their company code
/// like any other malformed row.
pub fn clear_export(
    export: &LedgerExport,
    rules: &RuleSet,
    calendar: &BusinessCalendar,
    org_chart: &OrgChart,
    as_of: NaiveDate,
    max_workers: Option<usize>,
) -> Result<ClearingRunResult> {
    let store = OpenItemStore::load_export(export);
    clear_store(&store, rules, calendar, org_chart, as_of, max_workers)
}

fn clear_store(
    store: &OpenItemStore,
    rules: &RuleSet,
    calendar: &BusinessCalendar,
    org_chart: &OrgChart,
    as_of: NaiveDate,
    max_workers: Option<usize>,
) -> Result<ClearingRunResult> {
    let engine = ClearingEngine::new(rules, calendar, as_of);

    let output = match max_workers {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()?;
            pool.install(|| engine.run(store))
        }
        None => engine.run(store),
    };

    let result = ResultAggregator::new(as_of)
        .aggregate(output.groups, output.unmatched, rules, org_chart)
        .with_diagnostics(output.diagnostics);
    info!(
        "Run {} finished: {} groups, {} open items, {} diagnostics",
        result.run_id,
        result.groups.len(),
        result.unmatched_items.len(),
        result.diagnostics.len()
    );
    Ok(result)
}
