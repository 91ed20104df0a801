//! Retag and reschedule commands for editing recorded history.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use tk_core::Tag;

use super::util::{format_tags, parse_time};
use crate::Config;
use crate::tracker::Tracker;

/// Replaces the tags of the event named by `event`.
pub fn retag<W: Write>(
    writer: &mut W,
    config: &Config,
    event: &str,
    tags: &[Tag],
) -> Result<()> {
    let mut tracker = Tracker::open(config)?;
    let id = tracker.resolve_event(event)?;
    let tags: BTreeSet<Tag> = tags.iter().cloned().collect();

    if tracker.retag(&id, &tags)? {
        writeln!(writer, "Retagged {}: {}", id.short(), format_tags(&tags))?;
    } else {
        writeln!(writer, "{} already has tags {}", id.short(), format_tags(&tags))?;
    }
    Ok(())
}

/// Moves the start of the event named by `event`.
pub fn reschedule<W: Write, Tz: TimeZone>(
    writer: &mut W,
    config: &Config,
    event: &str,
    time: &str,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    let mut tracker = Tracker::open(config)?;
    let id = tracker.resolve_event(event)?;
    let time = parse_time(time, now, tz)?;
    if time > now {
        bail!("cannot move an entry into the future");
    }

    let local = time.with_timezone(tz).format("%Y-%m-%d %H:%M");
    if tracker.reschedule(&id, time)? {
        writeln!(writer, "Moved {} to {local}", id.short())?;
    } else {
        writeln!(writer, "{} already starts at {local}", id.short())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::start::start;
    use crate::commands::testing::{at, config, render, tags};

    fn only_event(config: &Config) -> tk_core::Event {
        let tracker = Tracker::open(config).unwrap();
        let events: Vec<_> = tracker.timesheet().events().cloned().collect();
        assert_eq!(events.len(), 1);
        events.into_iter().next().unwrap()
    }

    #[test]
    fn retag_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        render(|w| start(w, &config, &tags(&["work", "email"]), Some("09:00"), at(27, 12, 0), &Utc));
        let event = only_event(&config);

        let output = render(|w| retag(w, &config, event.id.short(), &tags(&["work", "coding"])));
        assert_eq!(output, format!("Retagged {}: coding work\n", event.id.short()));
        assert_eq!(
            only_event(&config).tags,
            tags(&["coding", "work"]).into_iter().collect::<BTreeSet<_>>()
        );

        let output = render(|w| retag(w, &config, event.id.short(), &tags(&["work", "coding"])));
        assert_eq!(
            output,
            format!("{} already has tags coding work\n", event.id.short())
        );
    }

    #[test]
    fn reschedule_moves_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        render(|w| start(w, &config, &tags(&["work"]), Some("09:00"), at(27, 12, 0), &Utc));
        let event = only_event(&config);

        let output = render(|w| {
            reschedule(w, &config, event.id.as_str(), "08:30", at(27, 12, 0), &Utc)
        });
        assert_eq!(output, format!("Moved {} to 2025-01-27 08:30\n", event.id.short()));
        assert_eq!(only_event(&config).start, at(27, 8, 30));
    }

    #[test]
    fn reschedule_rejects_future() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        render(|w| start(w, &config, &tags(&["work"]), Some("09:00"), at(27, 12, 0), &Utc));
        let event = only_event(&config);

        let mut output = Vec::new();
        let err = reschedule(&mut output, &config, event.id.short(), "13:00", at(27, 12, 0), &Utc)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move an entry into the future");
    }

    #[test]
    fn unknown_event_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut output = Vec::new();
        let err = retag(&mut output, &config, "deadbeef", &tags(&["work"])).unwrap_err();
        assert_eq!(err.to_string(), "event not found: deadbeef");
    }
}
