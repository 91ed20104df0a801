//! Start and stop commands.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tk_core::Tag;

use super::util::{format_duration, format_tags, parse_time};
use crate::Config;
use crate::tracker::Tracker;

fn resolve_time<Tz: TimeZone>(
    at: Option<&str>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<DateTime<Utc>> {
    at.map_or(Ok(now), |at| parse_time(at, now, tz))
}

/// Starts tracking `tags`, ending the current activity if there is one.
pub fn start<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    tags: &[Tag],
    at: Option<&str>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    let mut tracker = Tracker::open(config)?;
    let at = resolve_time(at, now, tz)?;
    let previous = tracker.timesheet().current().cloned();
    let tags: BTreeSet<Tag> = tags.iter().cloned().collect();

    tracker.start(tags.clone(), at, now)?;

    if let Some(previous) = previous {
        writeln!(
            writer,
            "Stopped {} ({})",
            format_tags(&previous.tags),
            format_duration(at - previous.start)
        )?;
    }
    writeln!(
        writer,
        "Started {} at {}",
        format_tags(&tags),
        at.with_timezone(tz).format("%H:%M")
    )?;
    Ok(())
}

/// Stops tracking the current activity.
pub fn stop<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    at: Option<&str>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    let mut tracker = Tracker::open(config)?;
    let at = resolve_time(at, now, tz)?;
    let current = tracker.timesheet().current().cloned();

    tracker.stop(at, now)?;

    if let Some(current) = current {
        writeln!(
            writer,
            "Stopped {} at {} ({})",
            format_tags(&current.tags),
            at.with_timezone(tz).format("%H:%M"),
            format_duration(at - current.start)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{at, config, render, tags};
    use insta::assert_snapshot;

    #[test]
    fn start_then_switch_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let now = at(27, 12, 0);

        let output = render(|w| start(w, &config, &tags(&["work", "coding"]), Some("09:00"), now, &Utc));
        assert_snapshot!(output, @"Started coding work at 09:00");

        let output = render(|w| start(w, &config, &tags(&["lunch"]), Some("11:30"), now, &Utc));
        assert_snapshot!(output, @r"
        Stopped coding work (2h 30m)
        Started lunch at 11:30
        ");

        let output = render(|w| stop(w, &config, None, now, &Utc));
        assert_snapshot!(output, @"Stopped lunch at 12:00 (30m)");
    }

    #[test]
    fn start_right_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let now = at(27, 13, 0);

        render(|w| start(w, &config, &tags(&["work"]), Some("09:00"), now, &Utc));
        render(|w| stop(w, &config, Some("12:00"), now, &Utc));

        let output = render(|w| start(w, &config, &tags(&["lunch"]), Some("12:00"), now, &Utc));
        assert_snapshot!(output, @"Started lunch at 12:00");

        let output = render(|w| stop(w, &config, None, now, &Utc));
        assert_snapshot!(output, @"Stopped lunch at 13:00 (1h 0m)");
    }

    #[test]
    fn stop_when_idle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut output = Vec::new();
        let err = stop(&mut output, &config, None, at(27, 12, 0), &Utc).unwrap_err();
        assert_eq!(err.to_string(), "not tracking anything");
        assert!(output.is_empty());
    }

    #[test]
    fn start_rejects_future_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut output = Vec::new();
        let result = start(
            &mut output,
            &config,
            &tags(&["work"]),
            Some("2025-01-28T09:00:00Z"),
            at(27, 12, 0),
            &Utc,
        );
        assert!(result.is_err());
    }

    #[test]
    fn start_rejects_unparseable_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut output = Vec::new();
        let err = start(&mut output, &config, &tags(&["work"]), Some("soon"), at(27, 12, 0), &Utc)
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid time: soon"));
    }
}
