//! Payment ledger - rows read from one or more external spreadsheets.
//!
//! Sources are fetched concurrently. A source that fails is logged and contributes no
//! rows; the remaining sources are still used.

/// Google Sheets backed ledger source
pub mod google;

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

pub use google::GoogleSheetSource;

/// One payment row of the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct SheetEntry {
    /// Name of the payer as the bank reported it
    pub sender_name: String,
    /// Amount paid
    pub amount: f64,
    /// Memo identifier quoted by the payer
    pub member_id: String,
    /// Payment date as written in the sheet
    pub date: String,
    /// Name of the payee account
    pub recipient_name: String,
    /// When the row was recorded
    pub created_at: DateTime<Utc>,
}

/// A read-only source of ledger rows
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Identifies the source in logs.
    fn name(&self) -> &str;

    /// Reads every row currently in the source.
    async fn fetch_entries(&self) -> Result<Vec<SheetEntry>>;
}

/// Reads every source concurrently and concatenates their rows.
pub async fn fetch_ledger(sources: &[Arc<dyn LedgerSource>]) -> Vec<SheetEntry> {
    let results = join_all(sources.iter().map(|source| async move {
        (source.name().to_string(), source.fetch_entries().await)
    }))
    .await;

    let mut entries = Vec::new();
    for (name, result) in results {
        match result {
            Ok(rows) => {
                debug!(source = %name, rows = rows.len(), "Loaded ledger source");
                entries.extend(rows);
            }
            Err(e) => error!(source = %name, error = %e, "Failed to load ledger source"),
        }
    }

    info!(
        sources = sources.len(),
        rows = entries.len(),
        "Payment ledger loaded"
    );
    entries
}

/// Maps a sheet row onto a `SheetEntry`.
///
/// Columns: sender name, amount, memo id, date, recipient name, created at.
/// Returns `None` when `created_at` is missing or unparseable.
#[must_use]
pub fn parse_row(cells: &[String]) -> Option<SheetEntry> {
    let cell = |i: usize| cells.get(i).map_or("", |c| c.trim());

    let Some(created_at) = parse_timestamp(cell(5)) else {
        debug!(?cells, "Skipping ledger row without a usable timestamp");
        return None;
    };

    Some(SheetEntry {
        sender_name: cell(0).to_string(),
        amount: parse_amount(cell(1)).unwrap_or(0.0),
        member_id: cell(2).to_string(),
        date: cell(3).to_string(),
        recipient_name: cell(4).to_string(),
        created_at,
    })
}

/// Parses amounts like `"$1,250.00"`.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|a| a.is_finite())
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses the timestamp formats the ledger sheets use. Naive values are taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}
