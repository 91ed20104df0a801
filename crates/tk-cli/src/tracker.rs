//! The merged view of the sync folder, and the edits commands make to it.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use tk_core::{EventId, Merge, Patch, PatchId, RepositoryError, Tag, Timesheet, merge};
use tk_store::Store;

use crate::Config;
use crate::device;

/// Every patch in the sync folder, merged.
pub struct Tracker {
    store: Store,
    patches: Vec<Patch>,
    missing: Vec<PatchId>,
    merged: Merge,
}

impl Tracker {
    /// Opens the configured sync folder as this device.
    pub fn open(config: &Config) -> Result<Self> {
        let device_id = device::require_device_id(config)?;
        Self::open_as(&config.sync_folder, &device_id)
    }

    /// Opens a sync folder as the given device.
    pub fn open_as(sync_folder: &Path, device_id: &str) -> Result<Self> {
        let store = Store::open(sync_folder, device_id)
            .with_context(|| format!("failed to open sync folder {}", sync_folder.display()))?;
        let loaded = store.load_patches().context("failed to load patches")?;
        let merged = merge(&loaded.patches);
        for conflict in &merged.conflicts {
            tracing::warn!(%conflict, "merge conflict");
        }
        Ok(Self {
            store,
            patches: loaded.patches,
            missing: loaded.missing,
            merged,
        })
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub const fn timesheet(&self) -> &Timesheet {
        &self.merged.timesheet
    }

    pub fn conflicts(&self) -> &[RepositoryError] {
        &self.merged.conflicts
    }

    /// Patches listed by other devices that have not been synced yet.
    pub fn missing(&self) -> &[PatchId] {
        &self.missing
    }

    /// Resolves a full event id or a unique prefix of one.
    ///
    /// Events left out of the timesheet by a conflict can still be resolved,
    /// so that the conflict can be fixed.
    pub fn resolve_event(&self, prefix: &str) -> Result<EventId> {
        if prefix.is_empty() {
            bail!("event id cannot be empty");
        }
        let candidates: Vec<&EventId> = self
            .merged
            .patched
            .event_ids()
            .filter(|id| id.as_str().starts_with(prefix))
            .collect();
        match candidates.as_slice() {
            [] => bail!("event not found: {prefix}"),
            [id] => Ok((*id).clone()),
            _ => bail!(
                "event id {prefix} is ambiguous ({} matches); use a longer prefix",
                candidates.len()
            ),
        }
    }

    fn record(&mut self, patch: Patch) -> Result<()> {
        self.store
            .add_patch(&patch)
            .with_context(|| format!("failed to record patch {}", patch.id))?;
        self.patches.push(patch);
        self.merged = merge(&self.patches);
        Ok(())
    }

    fn ensure_free(&self, at: DateTime<Utc>) -> Result<()> {
        if let Some(existing) = self.timesheet().events().find(|event| event.start == at) {
            bail!(
                "another entry ({}) already starts at {}",
                existing.id.short(),
                at.to_rfc3339()
            );
        }
        Ok(())
    }

    /// Starts a new activity at `at`, ending whatever was running.
    ///
    /// A stop recorded at exactly `at` is turned into the new activity.
    pub fn start(
        &mut self,
        tags: BTreeSet<Tag>,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<EventId> {
        if tags.is_empty() {
            bail!("at least one tag is required to start tracking");
        }
        if at > now {
            bail!("cannot start tracking in the future");
        }
        if let Some(last) = self.timesheet().last() {
            if at < last.start {
                bail!(
                    "{} is before the latest entry ({}); use 'tk reschedule' to edit history",
                    at.to_rfc3339(),
                    last.id.short()
                );
            }
        }
        let stopped_at = self
            .timesheet()
            .last()
            .filter(|last| last.start == at && last.is_stop())
            .map(|last| last.id.clone());
        if let Some(marker) = stopped_at {
            self.retag(&marker, &tags)?;
            return Ok(marker);
        }
        self.ensure_free(at)?;

        let id = EventId::generate();
        self.record(Patch::new().create_event(id.clone(), at, tags))?;
        Ok(id)
    }

    /// Ends the open entry at `at`. Returns the stopped event.
    pub fn stop(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<EventId> {
        let Some(current) = self.timesheet().current().cloned() else {
            bail!("not tracking anything");
        };
        if at > now {
            bail!("cannot stop tracking in the future");
        }
        if at <= current.start {
            bail!(
                "stop time must be after the start of the current entry ({})",
                current.start.to_rfc3339()
            );
        }

        let marker = EventId::generate();
        self.record(Patch::new().create_event(marker, at, BTreeSet::new()))?;
        Ok(current.id)
    }

    /// Replaces the tags of an event. Returns false if nothing changed.
    pub fn retag(&mut self, event: &EventId, tags: &BTreeSet<Tag>) -> Result<bool> {
        let patched = self
            .merged
            .patched
            .event(event)
            .with_context(|| format!("event not found: {event}"))?;
        let parents = patched.latest_patches().clone();
        let current = patched.tags();
        let current_tags: BTreeSet<&Tag> = current.iter().map(|(_, tag)| tag).collect();

        let mut patch = Patch::new();
        for (added_by, tag) in &current {
            if !tags.contains(tag) {
                patch = patch.remove_tag(*added_by, event.clone(), tag.clone());
            }
        }
        for tag in tags {
            if !current_tags.contains(tag) {
                patch = patch.add_tag(parents.clone(), event.clone(), tag.clone());
            }
        }

        if patch.is_empty() {
            return Ok(false);
        }
        self.record(patch)?;
        Ok(true)
    }

    /// Moves an event to a new start, replacing every start it has now.
    /// Returns false if nothing changed.
    pub fn reschedule(&mut self, event: &EventId, time: DateTime<Utc>) -> Result<bool> {
        let patched = self
            .merged
            .patched
            .event(event)
            .with_context(|| format!("event not found: {event}"))?;
        let starts = patched.starts();
        if starts.len() == 1 && starts.iter().all(|(_, start)| *start == time) {
            return Ok(false);
        }
        if let Some(other) = self
            .timesheet()
            .events()
            .find(|other| other.start == time && &other.id != event)
        {
            bail!(
                "another entry ({}) already starts at {}",
                other.id.short(),
                time.to_rfc3339()
            );
        }

        let mut patch = Patch::new();
        for (added_by, start) in &starts {
            patch = patch.remove_start(*added_by, event.clone(), *start);
        }
        patch = patch.add_start(patched.latest_patches().clone(), event.clone(), time);
        self.record(patch)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 27, hour, minute, 0).unwrap()
    }

    fn tags(names: &[&str]) -> BTreeSet<Tag> {
        names.iter().map(|name| Tag::new(*name).unwrap()).collect()
    }

    fn current_tags(tracker: &Tracker) -> Vec<String> {
        tracker
            .timesheet()
            .current()
            .map(|event| event.tags.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn start_switch_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();

        tracker.start(tags(&["work"]), at(9, 0), at(12, 0)).unwrap();
        tracker.start(tags(&["lunch"]), at(11, 30), at(12, 0)).unwrap();
        assert_eq!(current_tags(&tracker), vec!["lunch"]);

        tracker.stop(at(12, 0), at(12, 0)).unwrap();
        assert!(tracker.timesheet().current().is_none());

        let entries = tracker.timesheet().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].end, Some(at(11, 30)));
        assert_eq!(entries[1].end, Some(at(12, 0)));

        // Everything survives a reload from disk.
        let reloaded = Tracker::open_as(dir.path(), "laptop").unwrap();
        assert_eq!(reloaded.timesheet(), tracker.timesheet());
    }

    #[test]
    fn stop_without_open_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();
        let err = tracker.stop(at(9, 0), at(9, 0)).unwrap_err();
        assert_eq!(err.to_string(), "not tracking anything");
    }

    #[test]
    fn start_rejects_future_and_backdated_times() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();

        assert!(tracker.start(tags(&["work"]), at(10, 0), at(9, 0)).is_err());

        tracker.start(tags(&["work"]), at(9, 0), at(10, 0)).unwrap();
        let err = tracker
            .start(tags(&["play"]), at(8, 0), at(10, 0))
            .unwrap_err();
        assert!(err.to_string().contains("tk reschedule"));

        let err = tracker
            .start(tags(&["play"]), at(9, 0), at(10, 0))
            .unwrap_err();
        assert!(err.to_string().contains("already starts at"));
    }

    #[test]
    fn start_at_the_stop_time_resumes_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();
        tracker.start(tags(&["work"]), at(9, 0), at(13, 0)).unwrap();
        tracker.stop(at(12, 0), at(13, 0)).unwrap();

        let lunch = tracker.start(tags(&["lunch"]), at(12, 0), at(13, 0)).unwrap();
        assert_eq!(current_tags(&tracker), vec!["lunch"]);
        assert_eq!(tracker.timesheet().current().unwrap().id, lunch);

        let reloaded = Tracker::open_as(dir.path(), "laptop").unwrap();
        assert!(reloaded.conflicts().is_empty());
        let entries = reloaded.timesheet().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].end, Some(at(12, 0)));
        assert_eq!(entries[1].start, at(12, 0));
        assert!(entries[1].is_open());
    }

    #[test]
    fn stop_must_follow_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();
        tracker.start(tags(&["work"]), at(9, 0), at(10, 0)).unwrap();
        assert!(tracker.stop(at(9, 0), at(10, 0)).is_err());
        assert!(tracker.stop(at(11, 0), at(10, 0)).is_err());
    }

    #[test]
    fn retag_replaces_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();
        let id = tracker
            .start(tags(&["work", "email"]), at(9, 0), at(10, 0))
            .unwrap();

        assert!(tracker.retag(&id, &tags(&["work", "coding"])).unwrap());
        assert_eq!(current_tags(&tracker), vec!["coding", "work"]);
        assert!(!tracker.retag(&id, &tags(&["work", "coding"])).unwrap());
    }

    #[test]
    fn reschedule_moves_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = Tracker::open_as(dir.path(), "laptop").unwrap();
        let id = tracker.start(tags(&["work"]), at(9, 0), at(10, 0)).unwrap();

        assert!(tracker.reschedule(&id, at(8, 30)).unwrap());
        assert_eq!(tracker.timesheet().current().unwrap().start, at(8, 30));
        assert!(!tracker.reschedule(&id, at(8, 30)).unwrap());
    }

    #[test]
    fn two_devices_share_a_sync_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut laptop = Tracker::open_as(dir.path(), "laptop").unwrap();
        laptop.start(tags(&["work"]), at(9, 0), at(9, 0)).unwrap();

        let mut desktop = Tracker::open_as(dir.path(), "desktop").unwrap();
        assert_eq!(current_tags(&desktop), vec!["work"]);
        desktop.stop(at(10, 0), at(10, 0)).unwrap();

        let laptop = Tracker::open_as(dir.path(), "laptop").unwrap();
        assert!(laptop.timesheet().current().is_none());
        assert_eq!(laptop.store().devices().unwrap().len(), 2);
    }

    #[test]
    fn concurrent_reschedule_conflict_is_resolvable() {
        let dir = tempfile::tempdir().unwrap();
        let mut laptop = Tracker::open_as(dir.path(), "laptop").unwrap();
        let id = laptop.start(tags(&["work"]), at(9, 0), at(10, 0)).unwrap();

        // Both devices load the same state, then edit without seeing each other.
        let mut desktop = Tracker::open_as(dir.path(), "desktop").unwrap();
        laptop.reschedule(&id, at(8, 0)).unwrap();
        desktop.reschedule(&id, at(8, 15)).unwrap();

        let mut merged = Tracker::open_as(dir.path(), "laptop").unwrap();
        assert_eq!(merged.conflicts().len(), 1);
        assert!(merged.timesheet().is_empty());

        let resolved = merged.resolve_event(&id.as_str()[..8]).unwrap();
        merged.reschedule(&resolved, at(8, 10)).unwrap();
        assert!(merged.conflicts().is_empty());
        assert_eq!(merged.timesheet().current().unwrap().start, at(8, 10));
    }

    #[test]
    fn resolve_event_reports_unknown_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open_as(dir.path(), "laptop").unwrap();
        let err = tracker.resolve_event("abc").unwrap_err();
        assert_eq!(err.to_string(), "event not found: abc");
    }
}
