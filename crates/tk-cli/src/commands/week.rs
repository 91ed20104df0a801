//! Week command: a visual overview of each day in 20 minute blocks.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tk_core::query::{CHART_CELL_MINUTES, ChartRow, week_chart};
use tk_core::{DateRange, Tag};

use super::util::format_tags;
use crate::Config;
use crate::cli::QueryArgs;
use crate::tracker::Tracker;

/// Renders one line per day under an hour ruler. Trailing blanks are
/// trimmed.
pub fn write_chart<W: Write>(writer: &mut W, rows: &[ChartRow]) -> Result<()> {
    let mut ruler = String::from("Day ");
    for hour in 0..24 {
        ruler.push_str(&format!("{hour:<3}"));
    }
    writeln!(writer, "{}", ruler.trim_end())?;

    for row in rows {
        let cells: String = row
            .cells
            .iter()
            .map(|filled| if *filled { '█' } else { ' ' })
            .collect();
        let line = format!("{} {cells}", row.date.format("%a"));
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
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
    let rows = week_chart(tracker.timesheet(), range, &filter, tz, now);

    writeln!(
        writer,
        "WEEK: {} to {} (one block = {CHART_CELL_MINUTES} minutes)",
        range.start(),
        range.end()
    )?;
    if !filter.is_empty() {
        writeln!(writer, "Filter: {}", format_tags(&filter))?;
    }
    write_chart(writer, &rows)
}
