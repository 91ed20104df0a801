//! Tracked events and the entries derived from them.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use crate::types::{EventId, Tag};

/// The moment an activity began.
///
/// An event with no tags is a stop marker: nothing is being tracked from
/// its start until the next event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub start: DateTime<Utc>,
    pub tags: BTreeSet<Tag>,
}

impl Event {
    pub const fn new(id: EventId, start: DateTime<Utc>, tags: BTreeSet<Tag>) -> Self {
        Self { id, start, tags }
    }

    /// Returns true if this event ends tracking rather than starting an activity.
    pub fn is_stop(&self) -> bool {
        self.tags.is_empty()
    }
}

/// A span of tracked time.
///
/// Entries are derived from consecutive events: an entry runs from its
/// event's start to the start of the following event. `end` is `None` only
/// for the chronologically last entry, which is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub event: EventId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub tags: BTreeSet<Tag>,
}

impl Entry {
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// End of the entry, with open entries running until `now`.
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now).max(self.start)
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end_or(now) - self.start
    }

    /// Returns true if the entry carries every tag in `filter`.
    pub fn matches(&self, filter: &BTreeSet<Tag>) -> bool {
        filter.is_subset(&self.tags)
    }
}
