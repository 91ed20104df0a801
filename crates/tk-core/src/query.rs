//! Aggregations over a timesheet: summaries, the week chart and the tag index.
//!
//! All functions take the reference time `now` and the local time zone as
//! parameters so they can be tested deterministically.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;

use crate::event::Entry;
use crate::timesheet::Timesheet;
use crate::types::{EventId, Tag};

/// Minutes covered by one cell of the week chart.
pub const CHART_CELL_MINUTES: i64 = 20;

/// Cells per day in the week chart.
pub const CHART_CELLS_PER_DAY: usize = 72;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const CELL_STEP: usize = CHART_CELL_MINUTES as usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("date range around {date} is outside the supported calendar")]
    OutOfRange { date: NaiveDate },
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
pub fn local_midnight_to_utc<Tz: TimeZone>(tz: &Tz, local_date: NaiveDate) -> DateTime<Utc> {
    let midnight = local_date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        // Single or ambiguous (DST fall-back): use the earlier time
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // DST spring-forward gap at midnight: use 1am local instead
            midnight
                .checked_add_signed(Duration::hours(1))
                .and_then(|one_am| tz.from_local_datetime(&one_am).earliest())
                .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
        }
    }
}

/// An inclusive range of local calendar days.
///
/// The day after `end` always exists, so the range has an exclusive upper
/// bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        if start > end {
            return Err(QueryError::InvertedRange { start, end });
        }
        if end.succ_opt().is_none() {
            return Err(QueryError::OutOfRange { date: end });
        }
        Ok(Self { start, end })
    }

    /// The week ending on `end`, inclusive: `end - 6 days ..= end`.
    pub fn week_ending(end: NaiveDate) -> Result<Self, QueryError> {
        let start = end
            .checked_sub_days(Days::new(6))
            .ok_or(QueryError::OutOfRange { date: end })?;
        Self::new(start, end)
    }

    /// The day after `end`.
    fn after_end(&self) -> NaiveDate {
        self.end.succ_opt().unwrap_or(self.end)
    }

    /// Resolves optional bounds, defaulting the end to `today` and the
    /// start to six days before the end.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, QueryError> {
        let end = end.unwrap_or(today);
        match start {
            Some(start) => Self::new(start, end),
            None => Self::week_ending(end),
        }
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while(|day| *day <= self.end)
    }

    /// Half-open UTC interval from the first local midnight to the midnight
    /// after the last day.
    pub fn bounds<Tz: TimeZone>(&self, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            local_midnight_to_utc(tz, self.start),
            local_midnight_to_utc(tz, self.after_end()),
        )
    }
}

/// An entry cut down to a query window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedEntry {
    pub event: EventId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tags: BTreeSet<Tag>,
    /// The underlying entry is still running.
    pub open: bool,
}

impl ClippedEntry {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Clips an entry to `[lo, hi)` and to `now`. Returns `None` if nothing
/// of the entry falls inside the window.
pub fn clip(
    entry: &Entry,
    lo: DateTime<Utc>,
    hi: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<ClippedEntry> {
    let start = entry.start.max(lo);
    let end = entry.end_or(now).min(hi).min(now.max(lo));
    (end > start).then(|| ClippedEntry {
        event: entry.event.clone(),
        start,
        end,
        tags: entry.tags.clone(),
        open: entry.is_open(),
    })
}

/// Entries matching `filter`, clipped to `[lo, hi)` and to `now`.
pub fn select(
    timesheet: &Timesheet,
    lo: DateTime<Utc>,
    hi: DateTime<Utc>,
    filter: &BTreeSet<Tag>,
    now: DateTime<Utc>,
) -> Vec<ClippedEntry> {
    timesheet
        .entries()
        .iter()
        .filter(|entry| entry.matches(filter))
        .filter_map(|entry| clip(entry, lo, hi, now))
        .collect()
}

fn total(entries: &[ClippedEntry]) -> Duration {
    entries
        .iter()
        .fold(Duration::zero(), |acc, entry| acc + entry.duration())
}

/// Time tracked on one local day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Entries split at local midnight, so each piece lies within the day.
    pub entries: Vec<ClippedEntry>,
    pub total: Duration,
}

/// Result of the `summary` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub range: DateRange,
    pub filter: BTreeSet<Tag>,
    /// Only days with tracked time are listed.
    pub days: Vec<DaySummary>,
    pub by_tag: BTreeMap<Tag, Duration>,
    pub total: Duration,
}

/// Summarizes matching entries over a date range.
pub fn summarize<Tz: TimeZone>(
    timesheet: &Timesheet,
    range: DateRange,
    filter: &BTreeSet<Tag>,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Summary {
    let (lo, hi) = range.bounds(tz);
    let selected = select(timesheet, lo, hi, filter, now);

    let mut by_tag: BTreeMap<Tag, Duration> = BTreeMap::new();
    for entry in &selected {
        for tag in &entry.tags {
            let slot = by_tag.entry(tag.clone()).or_insert_with(Duration::zero);
            *slot += entry.duration();
        }
    }

    let days = range
        .days()
        .filter_map(|date| {
            let day_lo = local_midnight_to_utc(tz, date);
            let day_hi = local_midnight_to_utc(tz, date.succ_opt().unwrap_or(date));
            let entries: Vec<ClippedEntry> = selected
                .iter()
                .filter_map(|entry| {
                    let start = entry.start.max(day_lo);
                    let end = entry.end.min(day_hi);
                    (end > start).then(|| ClippedEntry {
                        start,
                        end,
                        ..entry.clone()
                    })
                })
                .collect();
            (!entries.is_empty()).then(|| DaySummary {
                date,
                total: total(&entries),
                entries,
            })
        })
        .collect();

    tracing::debug!(
        entries = selected.len(),
        start = %range.start(),
        end = %range.end(),
        "summarized timesheet"
    );

    Summary {
        range,
        filter: filter.clone(),
        days,
        by_tag,
        total: total(&selected),
    }
}

/// One day of the week chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRow {
    pub date: NaiveDate,
    /// [`CHART_CELLS_PER_DAY`] cells, each [`CHART_CELL_MINUTES`] long.
    pub cells: Vec<bool>,
}

impl ChartRow {
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }
}

/// Samples the activity at the start of every cell of every day.
///
/// Cells are laid out on the local wall clock, `00:00` to `23:40`. A cell is
/// filled when something matching `filter` was being tracked at the cell's
/// start and that moment is not in the future. Cells whose local time is
/// skipped by a DST change stay empty.
pub fn week_chart<Tz: TimeZone>(
    timesheet: &Timesheet,
    range: DateRange,
    filter: &BTreeSet<Tag>,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Vec<ChartRow> {
    range
        .days()
        .map(|date| {
            let cells = (0..24)
                .flat_map(|hour| (0..60).step_by(CELL_STEP).map(move |minute| (hour, minute)))
                .map(|(hour, minute)| {
                    NaiveTime::from_hms_opt(hour, minute, 0)
                        .and_then(|time| tz.from_local_datetime(&date.and_time(time)).earliest())
                        .map(|local| local.with_timezone(&Utc))
                        .is_some_and(|time| {
                            time <= now
                                && timesheet
                                    .tags_at(time)
                                    .is_some_and(|tags| !tags.is_empty() && filter.is_subset(tags))
                        })
                })
                .collect();
            ChartRow { date, cells }
        })
        .collect()
}

/// Usage statistics for a single tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagStats {
    pub entries: usize,
    pub total: Duration,
}

/// Distinct tags with entry counts and total time, sorted by tag.
///
/// With `window`, only the parts of entries inside `[lo, hi)` count.
pub fn tag_index(
    timesheet: &Timesheet,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> BTreeMap<Tag, TagStats> {
    let (lo, hi) = window.unwrap_or((DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC));
    let mut index: BTreeMap<Tag, TagStats> = BTreeMap::new();
    for entry in timesheet.entries() {
        let duration = match clip(&entry, lo, hi, now) {
            Some(clipped) => clipped.duration(),
            // Entries outside the window are not listed, but an entry that
            // just started is still counted without a window.
            None if window.is_none() => Duration::zero(),
            None => continue,
        };
        for tag in entry.tags {
            let stats = index.entry(tag).or_insert(TagStats {
                entries: 0,
                total: Duration::zero(),
            });
            stats.entries += 1;
            stats.total += duration;
        }
    }
    index
}
