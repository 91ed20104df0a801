//! Patches: immutable, uniquely named sets of edits to events.
//!
//! Every change the user makes is written as a new patch. Devices never
//! modify each other's patches, so a sync folder can be merged by taking
//! the union of all patch files. Operations that build on earlier edits
//! name those patches as parents, which gives the merge a partial order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EventId, PatchId, Tag};

/// A set of edits identified by a random id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Patch {
    pub id: PatchId,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub add_start: BTreeSet<AddStart>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove_start: BTreeSet<RemoveStart>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub add_tag: BTreeSet<AddTag>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove_tag: BTreeSet<RemoveTag>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub create_event: BTreeSet<CreateEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddStart {
    #[serde(default)]
    pub parents: BTreeSet<PatchId>,
    pub event: EventId,
    pub time: DateTime<Utc>,
}

/// Removes a start that `patch` added.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoveStart {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub parents: BTreeSet<PatchId>,
    pub patch: PatchId,
    pub event: EventId,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddTag {
    #[serde(default)]
    pub parents: BTreeSet<PatchId>,
    pub event: EventId,
    pub tag: Tag,
}

/// Removes a tag that `patch` added.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoveTag {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub parents: BTreeSet<PatchId>,
    pub patch: PatchId,
    pub event: EventId,
    pub tag: Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CreateEvent {
    pub event: EventId,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
}

impl Patch {
    /// Creates an empty patch with a fresh id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub const fn with_id(id: PatchId) -> Self {
        Self {
            id,
            add_start: BTreeSet::new(),
            remove_start: BTreeSet::new(),
            add_tag: BTreeSet::new(),
            remove_tag: BTreeSet::new(),
            create_event: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add_start.is_empty()
            && self.remove_start.is_empty()
            && self.add_tag.is_empty()
            && self.remove_tag.is_empty()
            && self.create_event.is_empty()
    }

    /// Every patch this patch depends on, including the patches whose
    /// values it removes.
    pub fn parents(&self) -> BTreeSet<PatchId> {
        let add_start = self.add_start.iter().flat_map(AddStart::parents);
        let remove_start = self.remove_start.iter().flat_map(RemoveStart::parents);
        let add_tag = self.add_tag.iter().flat_map(AddTag::parents);
        let remove_tag = self.remove_tag.iter().flat_map(RemoveTag::parents);
        add_start
            .chain(remove_start)
            .chain(add_tag)
            .chain(remove_tag)
            .copied()
            .filter(|parent| *parent != self.id)
            .collect()
    }

    /// Every event this patch touches without creating it.
    pub fn referenced_events(&self) -> impl Iterator<Item = &EventId> {
        self.add_start
            .iter()
            .map(|op| &op.event)
            .chain(self.remove_start.iter().map(|op| &op.event))
            .chain(self.add_tag.iter().map(|op| &op.event))
            .chain(self.remove_tag.iter().map(|op| &op.event))
    }

    #[must_use]
    pub fn create_event(mut self, event: EventId, start: DateTime<Utc>, tags: BTreeSet<Tag>) -> Self {
        self.create_event.insert(CreateEvent { event, start, tags });
        self
    }

    #[must_use]
    pub fn add_start(
        mut self,
        parents: BTreeSet<PatchId>,
        event: EventId,
        time: DateTime<Utc>,
    ) -> Self {
        self.add_start.insert(AddStart {
            parents,
            event,
            time,
        });
        self
    }

    #[must_use]
    pub fn remove_start(mut self, patch: PatchId, event: EventId, time: DateTime<Utc>) -> Self {
        self.remove_start.insert(RemoveStart {
            parents: BTreeSet::new(),
            patch,
            event,
            time,
        });
        self
    }

    #[must_use]
    pub fn add_tag(mut self, parents: BTreeSet<PatchId>, event: EventId, tag: Tag) -> Self {
        self.add_tag.insert(AddTag {
            parents,
            event,
            tag,
        });
        self
    }

    #[must_use]
    pub fn remove_tag(mut self, patch: PatchId, event: EventId, tag: Tag) -> Self {
        self.remove_tag.insert(RemoveTag {
            parents: BTreeSet::new(),
            patch,
            event,
            tag,
        });
        self
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}

impl AddStart {
    pub fn parents(&self) -> impl Iterator<Item = &PatchId> {
        self.parents.iter()
    }
}

impl RemoveStart {
    pub fn parents(&self) -> impl Iterator<Item = &PatchId> {
        std::iter::once(&self.patch).chain(self.parents.iter())
    }
}

impl AddTag {
    pub fn parents(&self) -> impl Iterator<Item = &PatchId> {
        self.parents.iter()
    }
}

impl RemoveTag {
    pub fn parents(&self) -> impl Iterator<Item = &PatchId> {
        std::iter::once(&self.patch).chain(self.parents.iter())
    }
}
