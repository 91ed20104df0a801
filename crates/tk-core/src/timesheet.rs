//! The flattened, chronological view of all events.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::event::{Entry, Event};
use crate::types::Tag;

/// Events ordered by start time. No two events share a start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timesheet {
    events: BTreeMap<DateTime<Utc>, Event>,
}

impl Timesheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event, returning the existing event if one already
    /// starts at the same time.
    pub fn insert(&mut self, event: Event) -> Result<(), Event> {
        if let Some(existing) = self.events.get(&event.start) {
            return Err(existing.clone());
        }
        self.events.insert(event.start, event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in chronological order.
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &Event> {
        self.events.values()
    }

    /// The last event, which determines whether anything is being tracked.
    pub fn last(&self) -> Option<&Event> {
        self.events.values().next_back()
    }

    /// The open entry's event, if tracking is in progress.
    pub fn current(&self) -> Option<&Event> {
        self.last().filter(|event| !event.is_stop())
    }

    /// The event in effect at `time`, if any started at or before it.
    pub fn event_at(&self, time: DateTime<Utc>) -> Option<&Event> {
        self.events.range(..=time).next_back().map(|(_, event)| event)
    }

    /// Tags of the activity at `time`. Empty while stopped.
    pub fn tags_at(&self, time: DateTime<Utc>) -> Option<&BTreeSet<Tag>> {
        self.event_at(time).map(|event| &event.tags)
    }

    /// Derives entries from consecutive events. Stop markers end the
    /// previous entry and produce none of their own.
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut events = self.events.values().peekable();
        while let Some(event) = events.next() {
            if event.is_stop() {
                continue;
            }
            entries.push(Entry {
                event: event.id.clone(),
                start: event.start,
                end: events.peek().map(|next| next.start),
                tags: event.tags.clone(),
            });
        }
        entries
    }
}
