//! Status command for showing the current activity and sync health.

use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use super::util::{format_duration, format_tags};
use crate::Config;
use crate::tracker::Tracker;

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    let tracker = Tracker::open(config)?;
    let store = tracker.store();

    match tracker.timesheet().current() {
        Some(event) => writeln!(
            writer,
            "Tracking: {} since {} ({})",
            format_tags(&event.tags),
            event.start.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            format_duration(now - event.start)
        )?,
        None => writeln!(writer, "Not tracking anything.")?,
    }

    let label = store.meta(store.device_id())?.label;
    match label {
        Some(label) => writeln!(writer, "Device: {label} ({})", store.device_id())?,
        None => writeln!(writer, "Device: {}", store.device_id())?,
    }
    writeln!(writer, "Sync folder: {}", store.root().display())?;
    writeln!(
        writer,
        "Entries: {} from {} device(s)",
        tracker.timesheet().entries().len(),
        store.devices()?.len()
    )?;

    if !tracker.missing().is_empty() {
        writeln!(
            writer,
            "Waiting for {} patch(es) to sync.",
            tracker.missing().len()
        )?;
    }

    let conflicts = tracker.conflicts();
    if !conflicts.is_empty() {
        writeln!(writer, "Conflicts:")?;
        for conflict in conflicts {
            writeln!(writer, "- {conflict}")?;
        }
        writeln!(
            writer,
            "Hint: Run 'tk reschedule <event> <time>' to settle an entry's start."
        )?;
    }

    Ok(())
}
