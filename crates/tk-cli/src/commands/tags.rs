//! Tags command for listing every tag in use.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tk_core::DateRange;
use tk_core::query::tag_index;

use super::util::format_duration;
use crate::Config;
use crate::cli::RangeArgs;
use crate::tracker::Tracker;

/// Lists tags with entry counts and total time. Without `--start` or
/// `--end` every entry ever tracked counts.
pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    range: &RangeArgs,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()> {
    let tracker = Tracker::open(config)?;

    let window = if range.start.is_none() && range.end.is_none() {
        None
    } else {
        let today = now.with_timezone(tz).date_naive();
        Some(DateRange::resolve(range.start, range.end, today)?.bounds(tz))
    };
    let index = tag_index(tracker.timesheet(), window, now);

    if index.is_empty() {
        writeln!(writer, "No tags in use.")?;
        return Ok(());
    }

    let width = index
        .keys()
        .map(|tag| tag.as_str().len())
        .max()
        .unwrap_or(0)
        .max("TAG".len());
    writeln!(writer, "{:<width$}  {:>7}  {:>8}", "TAG", "ENTRIES", "TOTAL")?;
    for (tag, stats) in &index {
        writeln!(
            writer,
            "{:<width$}  {:>7}  {:>8}",
            tag.as_str(),
            stats.entries,
            format_duration(stats.total)
        )?;
    }

    Ok(())
}
