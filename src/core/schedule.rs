//! Campaign schedule materialization.
//!
//! Expands a campaign's window and cadence into concrete UTC send times and renders
//! the per-occurrence content. Everything here is pure; persistence happens in
//! `core::campaign`.

use crate::{
    entities::{CampaignModel, Recurrence},
    errors::{Error, Result},
};
use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Window, time of day, zone and cadence of a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// First local day of the window
    pub start_date: NaiveDate,
    /// Last local day of the window
    pub end_date: NaiveDate,
    /// Local send time
    pub send_time: NaiveTime,
    /// IANA zone name
    pub time_zone: String,
    /// Cadence, `None` for a one-off
    pub recurrence: Option<Recurrence>,
}

/// One materialized send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// UTC instant the item is due
    pub scheduled_at: DateTime<Utc>,
    /// Rendered content
    pub content: String,
}

/// Parses an IANA time zone name.
pub fn parse_time_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| Error::InvalidSchedule {
        message: format!("Unknown time zone '{name}'"),
    })
}

/// Local dates on which the cadence fires, from `start` through `end` inclusive.
///
/// Month-based cadences are computed from `start` each time, so a campaign starting
/// on the 31st keeps returning to the 31st after shorter months.
#[must_use]
pub fn occurrence_dates(
    start: NaiveDate,
    end: NaiveDate,
    recurrence: Option<Recurrence>,
) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let Some(recurrence) = recurrence else {
        return vec![start];
    };

    let mut dates = Vec::new();
    for step in 0u32.. {
        match nth_occurrence(start, recurrence, step) {
            Some(date) if date <= end => dates.push(date),
            _ => break,
        }
    }
    dates
}

fn nth_occurrence(start: NaiveDate, recurrence: Recurrence, n: u32) -> Option<NaiveDate> {
    let n64 = u64::from(n);
    match recurrence {
        Recurrence::Daily => start.checked_add_days(Days::new(n64)),
        Recurrence::Weekly => start.checked_add_days(Days::new(7 * n64)),
        Recurrence::SemiMonthly => start.checked_add_days(Days::new(15 * n64)),
        Recurrence::Monthly => start.checked_add_months(Months::new(n)),
        Recurrence::SemiAnnually => start.checked_add_months(Months::new(6 * n)),
        Recurrence::Annually => start.checked_add_months(Months::new(12 * n)),
    }
}

/// Converts a local wall-clock time to UTC. Ambiguous times resolve to the earliest
/// instant; times inside a DST gap return `None`.
#[must_use]
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Picks the template variant for an occurrence and fills in `{days_left}`.
///
/// A template with several `*`-separated variants rotates through them; a template
/// with at most one non-blank variant is used as written.
#[must_use]
pub fn render_template(template: &str, occurrence_index: usize, days_left: i64) -> String {
    let variants: Vec<&str> = template
        .split('*')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let chosen = if variants.len() > 1 {
        variants[occurrence_index % variants.len()]
    } else {
        template.trim()
    };
    chosen.replace("{days_left}", &days_left.to_string())
}

/// Expands a schedule and template into UTC send times and rendered content.
pub fn plan_occurrences(schedule: &Schedule, template: &str) -> Result<Vec<Occurrence>> {
    let tz = parse_time_zone(&schedule.time_zone)?;
    if schedule.start_date > schedule.end_date {
        return Err(Error::InvalidSchedule {
            message: format!(
                "Start date {} is after end date {}",
                schedule.start_date, schedule.end_date
            ),
        });
    }

    let mut occurrences = Vec::new();
    for date in occurrence_dates(schedule.start_date, schedule.end_date, schedule.recurrence) {
        let Some(scheduled_at) = local_to_utc(tz, date.and_time(schedule.send_time)) else {
            warn!(%date, time_zone = %schedule.time_zone, "Skipping occurrence inside a DST gap");
            continue;
        };
        let days_left = (schedule.end_date - date).num_days();
        occurrences.push(Occurrence {
            scheduled_at,
            content: render_template(template, occurrences.len(), days_left),
        });
    }

    if occurrences.is_empty() {
        return Err(Error::InvalidSchedule {
            message: "Schedule produces no occurrences".to_string(),
        });
    }
    Ok(occurrences)
}

/// UTC bounds of a campaign's payment window: local midnight of the start date up
/// to the last second of the end date.
pub fn payment_window(campaign: &CampaignModel) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = parse_time_zone(&campaign.time_zone)?;
    let window_start = campaign.start_date.and_time(NaiveTime::MIN);
    let window_end = campaign
        .end_date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| Error::InvalidSchedule {
            message: format!("Invalid end date {}", campaign.end_date),
        })?;

    // A DST gap at midnight falls back to reading the wall clock as UTC.
    let resolve = |local: NaiveDateTime| local_to_utc(tz, local).unwrap_or_else(|| local.and_utc());
    Ok((resolve(window_start), resolve(window_end)))
}
