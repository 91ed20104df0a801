//! Summary command for reporting tracked time per day and per tag.
//!
//! This module implements `tk summary` with an optional tag filter and date
//! range, and two output formats (human-readable, JSON).

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use tk_core::query::{ClippedEntry, summarize};
use tk_core::{DateRange, Summary, Tag};

use super::util::{format_duration, format_tags, progress_bar};
use crate::Config;
use crate::cli::QueryArgs;
use crate::tracker::Tracker;

/// Tags ordered by time spent, longest first.
fn tags_by_time(summary: &Summary) -> Vec<(&Tag, Duration)> {
    let mut tags: Vec<(&Tag, Duration)> = summary
        .by_tag
        .iter()
        .map(|(tag, total)| (tag, *total))
        .collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    tags
}

/// Writes the human-readable summary.
pub fn write_summary<W: Write, Tz: TimeZone>(
    writer: &mut W,
    summary: &Summary,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    writeln!(
        writer,
        "SUMMARY: {} to {}",
        summary.range.start(),
        summary.range.end()
    )?;
    if !summary.filter.is_empty() {
        writeln!(writer, "Filter: {}", format_tags(&summary.filter))?;
    }

    if summary.days.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No time tracked in this range.")?;
        return Ok(());
    }

    for day in &summary.days {
        writeln!(writer)?;
        writeln!(
            writer,
            "{}  {}",
            day.date.format("%a %Y-%m-%d"),
            format_duration(day.total)
        )?;
        for entry in &day.entries {
            writeln!(
                writer,
                "  {}-{}  {:>8}  {}",
                entry.start.with_timezone(tz).format("%H:%M"),
                entry.end.with_timezone(tz).format("%H:%M"),
                format_duration(entry.duration()),
                format_tags(&entry.tags)
            )?;
        }
    }

    let tags = tags_by_time(summary);
    let width = tags.iter().map(|(tag, _)| tag.as_str().len()).max().unwrap_or(0);
    let max = tags.first().map_or_else(Duration::zero, |(_, total)| *total);
    writeln!(writer)?;
    writeln!(writer, "BY TAG")?;
    writeln!(writer, "──────")?;
    for (tag, total) in &tags {
        writeln!(
            writer,
            "{:<width$}  {:>8}  {}",
            tag.as_str(),
            format_duration(*total),
            progress_bar(*total, max)
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "TOTAL: {}", format_duration(summary.total))?;
    Ok(())
}

// ========== JSON Output ==========

#[derive(Debug, Serialize)]
pub struct JsonSummary {
    pub generated_at: String,
    pub timezone: String,
    pub range: JsonRange,
    pub filter: Vec<String>,
    pub total_ms: i64,
    pub by_tag: Vec<JsonTagTotal>,
    pub days: Vec<JsonDay>,
}

#[derive(Debug, Serialize)]
pub struct JsonRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct JsonTagTotal {
    pub tag: String,
    pub total_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct JsonDay {
    pub date: String,
    pub total_ms: i64,
    pub entries: Vec<JsonEntry>,
}

#[derive(Debug, Serialize)]
pub struct JsonEntry {
    pub event: String,
    pub start: String,
    pub end: String,
    pub tags: Vec<String>,
    /// The entry is still being tracked.
    pub open: bool,
}

impl From<&ClippedEntry> for JsonEntry {
    fn from(entry: &ClippedEntry) -> Self {
        Self {
            event: entry.event.to_string(),
            start: entry.start.to_rfc3339(),
            end: entry.end.to_rfc3339(),
            tags: entry.tags.iter().map(ToString::to_string).collect(),
            open: entry.open,
        }
    }
}

/// Formats a summary as pretty-printed JSON.
pub fn format_summary_json(
    summary: &Summary,
    generated_at: DateTime<Utc>,
    timezone: &str,
) -> Result<String> {
    let report = JsonSummary {
        generated_at: generated_at.to_rfc3339(),
        timezone: timezone.to_string(),
        range: JsonRange {
            start: summary.range.start().format("%Y-%m-%d").to_string(),
            end: summary.range.end().format("%Y-%m-%d").to_string(),
        },
        filter: summary.filter.iter().map(ToString::to_string).collect(),
        total_ms: summary.total.num_milliseconds(),
        by_tag: tags_by_time(summary)
            .into_iter()
            .map(|(tag, total)| JsonTagTotal {
                tag: tag.to_string(),
                total_ms: total.num_milliseconds(),
            })
            .collect(),
        days: summary
            .days
            .iter()
            .map(|day| JsonDay {
                date: day.date.format("%Y-%m-%d").to_string(),
                total_ms: day.total.num_milliseconds(),
                entries: day.entries.iter().map(JsonEntry::from).collect(),
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    query: &QueryArgs,
    json: bool,
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
    let summary = summarize(tracker.timesheet(), range, &filter, tz, now);

    if json {
        let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
        writeln!(writer, "{}", format_summary_json(&summary, now, &timezone)?)?;
    } else {
        write_summary(writer, &summary, tz)?;
    }

    Ok(())
}
