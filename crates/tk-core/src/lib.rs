//! Core domain logic for the tk time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Patches: immutable edits written by each device
//! - Repository: merging patches from all devices into a timesheet
//! - Queries: summaries, the week chart and the tag index

pub mod event;
pub mod patch;
pub mod query;
pub mod repository;
pub mod timesheet;
pub mod types;

pub use event::{Entry, Event};
pub use patch::Patch;
pub use query::{DateRange, QueryError, Summary, TagStats};
pub use repository::{Merge, PatchedEvent, PatchedTimesheet, RepositoryError, merge};
pub use timesheet::Timesheet;
pub use types::{EventId, PatchId, Tag, ValidationError};
