//! Merging patches into a timesheet.
//!
//! Patches from every device are applied in dependency order into a
//! [`PatchedTimesheet`], an intermediate form in which an event may briefly
//! hold several start times (for example after two devices rescheduled it
//! concurrently). Flattening then produces a [`Timesheet`] plus the list of
//! events that could not be flattened.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::Event;
use crate::patch::Patch;
use crate::timesheet::Timesheet;
use crate::types::{EventId, PatchId, Tag};

/// Problems found while merging patches.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("unknown event {event} in patch {patch}")]
    UnknownEvent { patch: PatchId, event: EventId },

    #[error("two events were created with the same id {event} (patch {patch})")]
    DuplicateEventId { patch: PatchId, event: EventId },

    #[error("patch {patch} depends on patches that are not available: {missing:?}")]
    MissingParents {
        patch: PatchId,
        missing: BTreeSet<PatchId>,
    },

    #[error("event {event} has multiple start times: {starts:?}")]
    MultipleStartTimes {
        event: EventId,
        starts: Vec<DateTime<Utc>>,
    },

    #[error("event {event} has no start time")]
    NoStartTime { event: EventId },

    #[error("events {event_a} and {event_b} have the same start time {start}")]
    DuplicateEventTime {
        event_a: EventId,
        event_b: EventId,
        start: DateTime<Utc>,
    },
}

/// An event as seen through every patch applied to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchedEvent {
    starts_added: BTreeSet<(PatchId, DateTime<Utc>)>,
    starts_removed: BTreeSet<(PatchId, DateTime<Utc>)>,
    tags_added: BTreeSet<(PatchId, Tag)>,
    tags_removed: BTreeSet<(PatchId, Tag)>,

    /// Patches applied to this event that no later patch refers to. New
    /// edits use these as parents. Holds more than one patch when devices
    /// edited the event concurrently.
    latest_patches: BTreeSet<PatchId>,
}

impl PatchedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_patch(&mut self, patch: PatchId, parents: impl IntoIterator<Item = PatchId>) {
        for parent in parents {
            self.latest_patches.remove(&parent);
        }
        self.latest_patches.insert(patch);
    }

    pub fn add_start(&mut self, patch: PatchId, time: DateTime<Utc>) {
        self.starts_added.insert((patch, time));
    }

    pub fn remove_start(&mut self, patch: PatchId, time: DateTime<Utc>) {
        self.starts_removed.insert((patch, time));
    }

    pub fn add_tag(&mut self, patch: PatchId, tag: Tag) {
        self.tags_added.insert((patch, tag));
    }

    pub fn remove_tag(&mut self, patch: PatchId, tag: Tag) {
        self.tags_removed.insert((patch, tag));
    }

    /// Current starts, paired with the patch that added each one.
    pub fn starts(&self) -> BTreeSet<(PatchId, DateTime<Utc>)> {
        self.starts_added
            .difference(&self.starts_removed)
            .cloned()
            .collect()
    }

    /// Current tags, paired with the patch that added each one. The same
    /// tag may appear more than once if several devices added it.
    pub fn tags(&self) -> BTreeSet<(PatchId, Tag)> {
        self.tags_added
            .difference(&self.tags_removed)
            .cloned()
            .collect()
    }

    pub const fn latest_patches(&self) -> &BTreeSet<PatchId> {
        &self.latest_patches
    }

    /// Collapses the event to a single start and a plain tag set.
    pub fn flatten(&self, id: &EventId) -> Result<Event, RepositoryError> {
        let starts: BTreeSet<DateTime<Utc>> =
            self.starts().into_iter().map(|(_, time)| time).collect();
        let mut iter = starts.iter();
        let start = match (iter.next(), iter.next()) {
            (Some(start), None) => *start,
            (None, _) => return Err(RepositoryError::NoStartTime { event: id.clone() }),
            (Some(_), Some(_)) => {
                return Err(RepositoryError::MultipleStartTimes {
                    event: id.clone(),
                    starts: starts.into_iter().collect(),
                });
            }
        };
        let tags = self.tags().into_iter().map(|(_, tag)| tag).collect();
        Ok(Event::new(id.clone(), start, tags))
    }
}

/// All events with their full patch history.
#[derive(Debug, Clone, Default)]
pub struct PatchedTimesheet {
    events: BTreeMap<EventId, PatchedEvent>,
    applied: BTreeSet<PatchId>,
}

/// The result of merging a set of patches.
#[derive(Debug, Clone)]
pub struct Merge {
    pub patched: PatchedTimesheet,
    pub timesheet: Timesheet,
    /// Patches that were rejected and events that could not be flattened.
    pub conflicts: Vec<RepositoryError>,
}

impl PatchedTimesheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&self, id: &EventId) -> Option<&PatchedEvent> {
        self.events.get(id)
    }

    pub fn event_ids(&self) -> impl Iterator<Item = &EventId> {
        self.events.keys()
    }

    pub fn is_applied(&self, patch: &PatchId) -> bool {
        self.applied.contains(patch)
    }

    /// Applies a single patch whose parents have already been applied.
    ///
    /// The patch is verified first; on failure nothing is changed.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<(), Vec<RepositoryError>> {
        self.verify_patch(patch)?;
        let patch_id = patch.id;

        for op in &patch.add_start {
            if let Some(event) = self.events.get_mut(&op.event) {
                event.add_start(patch_id, op.time);
                event.record_patch(patch_id, op.parents().copied());
            }
        }
        for op in &patch.remove_start {
            if let Some(event) = self.events.get_mut(&op.event) {
                event.remove_start(op.patch, op.time);
                event.record_patch(patch_id, op.parents().copied());
            }
        }
        for op in &patch.add_tag {
            if let Some(event) = self.events.get_mut(&op.event) {
                event.add_tag(patch_id, op.tag.clone());
                event.record_patch(patch_id, op.parents().copied());
            }
        }
        for op in &patch.remove_tag {
            if let Some(event) = self.events.get_mut(&op.event) {
                event.remove_tag(op.patch, op.tag.clone());
                event.record_patch(patch_id, op.parents().copied());
            }
        }
        for op in &patch.create_event {
            let mut event = PatchedEvent::new();
            event.add_start(patch_id, op.start);
            for tag in &op.tags {
                event.add_tag(patch_id, tag.clone());
            }
            event.record_patch(patch_id, []);
            self.events.insert(op.event.clone(), event);
        }

        self.applied.insert(patch_id);
        tracing::trace!(patch = %patch_id, "applied patch");
        Ok(())
    }

    fn verify_patch(&self, patch: &Patch) -> Result<(), Vec<RepositoryError>> {
        let mut errors = Vec::new();

        for event in patch.referenced_events() {
            if !self.events.contains_key(event) {
                errors.push(RepositoryError::UnknownEvent {
                    patch: patch.id,
                    event: event.clone(),
                });
            }
        }
        for op in &patch.create_event {
            if self.events.contains_key(&op.event) {
                errors.push(RepositoryError::DuplicateEventId {
                    patch: patch.id,
                    event: op.event.clone(),
                });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Applies a batch of patches in dependency order.
    ///
    /// Patches that were already applied are skipped. Patches whose parents
    /// are neither applied nor in the batch are reported, as are patches that
    /// fail verification. The order of `patches` does not affect the result.
    pub fn apply_all<'a>(
        &mut self,
        patches: impl IntoIterator<Item = &'a Patch>,
    ) -> Vec<RepositoryError> {
        let mut pending: BTreeMap<PatchId, &Patch> = patches
            .into_iter()
            .filter(|patch| !self.applied.contains(&patch.id))
            .map(|patch| (patch.id, patch))
            .collect();
        let mut errors = Vec::new();

        loop {
            let ready: Vec<PatchId> = pending
                .values()
                .filter(|patch| {
                    patch
                        .parents()
                        .iter()
                        .all(|parent| self.applied.contains(parent))
                })
                .map(|patch| patch.id)
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                let Some(patch) = pending.remove(&id) else {
                    continue;
                };
                if let Err(mut rejected) = self.apply_patch(patch) {
                    tracing::debug!(patch = %id, "rejected patch");
                    errors.append(&mut rejected);
                }
            }
        }

        for patch in pending.values() {
            let missing: BTreeSet<PatchId> = patch
                .parents()
                .into_iter()
                .filter(|parent| !self.applied.contains(parent))
                .collect();
            tracing::debug!(patch = %patch.id, ?missing, "patch is waiting for parents");
            errors.push(RepositoryError::MissingParents {
                patch: patch.id,
                missing,
            });
        }

        errors
    }

    /// Flattens every event, leaving out the ones that conflict.
    pub fn flatten(&self) -> (Timesheet, Vec<RepositoryError>) {
        let mut timesheet = Timesheet::new();
        let mut errors = Vec::new();

        for (id, patched) in &self.events {
            match patched.flatten(id) {
                Ok(event) => {
                    if let Err(existing) = timesheet.insert(event) {
                        errors.push(RepositoryError::DuplicateEventTime {
                            event_a: existing.id,
                            event_b: id.clone(),
                            start: existing.start,
                        });
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        (timesheet, errors)
    }
}

/// Merges a set of patches from any number of devices.
pub fn merge<'a>(patches: impl IntoIterator<Item = &'a Patch>) -> Merge {
    let mut patched = PatchedTimesheet::new();
    let mut conflicts = patched.apply_all(patches);
    let (timesheet, mut flatten_errors) = patched.flatten();
    conflicts.append(&mut flatten_errors);
    Merge {
        patched,
        timesheet,
        conflicts,
    }
}
