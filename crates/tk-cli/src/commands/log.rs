//! Log command for listing tracked entries.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tk_core::query::clip;
use tk_core::{DateRange, Entry, Tag};

use super::util::{format_duration, format_tags};
use crate::Config;
use crate::cli::QueryArgs;
use crate::tracker::Tracker;

/// Entries overlapping `range` whose tags include `filter`, oldest first.
fn entries_in_range<Tz: TimeZone>(
    tracker: &Tracker,
    range: DateRange,
    filter: &BTreeSet<Tag>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<Entry> {
    let (lo, hi) = range.bounds(tz);
    tracker
        .timesheet()
        .entries()
        .into_iter()
        .filter(|entry| entry.matches(filter) && clip(entry, lo, hi, now).is_some())
        .collect()
}

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    query: &QueryArgs,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    let tracker = Tracker::open(config)?;
    let today = now.with_timezone(tz).date_naive();
    let range = DateRange::resolve(query.range.start, query.range.end, today)?;
    let filter: BTreeSet<Tag> = query.tags.iter().cloned().collect();
    let entries = entries_in_range(&tracker, range, &filter, now, tz);

    if entries.is_empty() {
        writeln!(
            writer,
            "No entries between {} and {}.",
            range.start(),
            range.end()
        )?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<8}  {:<10}  {:<5}  {:<5}  {:>8}  TAGS",
        "ID", "DATE", "START", "END", "DURATION"
    )?;
    for entry in &entries {
        let start = entry.start.with_timezone(tz);
        let end = entry.end.map_or_else(
            || "now".to_string(),
            |end| end.with_timezone(tz).format("%H:%M").to_string(),
        );
        writeln!(
            writer,
            "{:<8}  {}  {}  {:<5}  {:>8}  {}",
            entry.event.short(),
            start.format("%Y-%m-%d"),
            start.format("%H:%M"),
            end,
            format_duration(entry.duration(now)),
            format_tags(&entry.tags)
        )?;
    }

    Ok(())
}
