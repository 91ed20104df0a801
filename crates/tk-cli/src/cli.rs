//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tk_core::Tag;

/// Personal time tracker.
///
/// Records what you are working on as tagged spans of time and reports
/// where your time has gone. Data is kept in a sync folder that any file
/// synchronization service can share between devices.
#[derive(Debug, Parser)]
#[command(name = "tk", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or update this device's identity.
    Init {
        /// Human-friendly label for this device (defaults to the host name).
        #[arg(long)]
        label: Option<String>,
    },

    /// Start tracking an activity, ending the current one.
    Start {
        /// Tags describing the activity.
        #[arg(required = true)]
        tags: Vec<Tag>,

        /// When the activity started (e.g. "09:30", "15 minutes ago").
        #[arg(long)]
        at: Option<String>,
    },

    /// Stop tracking the current activity.
    Stop {
        /// When the activity ended (e.g. "17:45", "5 minutes ago").
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the current activity and the state of the sync folder.
    Status,

    /// List tracked entries.
    Log(QueryArgs),

    /// Summarize tracked time per day and per tag.
    Summary {
        #[command(flatten)]
        query: QueryArgs,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show a visual overview of each day in 20 minute blocks.
    Week(QueryArgs),

    /// List every tag in use with its total time.
    Tags(RangeArgs),

    /// Replace the tags of an entry.
    Retag {
        /// Event id or a unique prefix of it (see `tk log`).
        event: String,

        /// The new tags.
        #[arg(required = true)]
        tags: Vec<Tag>,
    },

    /// Move the start of an entry.
    Reschedule {
        /// Event id or a unique prefix of it (see `tk log`).
        event: String,

        /// The new start time (e.g. "2025-01-27T09:00:00Z", "09:00").
        time: String,
    },

    /// List devices that have written to the sync folder.
    Devices,
}

/// A tag filter plus a date range.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Only include entries carrying all of these tags.
    pub tags: Vec<Tag>,

    #[command(flatten)]
    pub range: RangeArgs,
}

/// An inclusive range of local dates.
#[derive(Debug, Clone, Default, Args)]
pub struct RangeArgs {
    /// First day to include (YYYY-MM-DD). Defaults to six days before --end.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn summary_parses_tags_and_range() {
        let cli = Cli::try_parse_from([
            "tk", "summary", "work", "coding", "--start", "2025-01-27", "--end", "2025-02-02",
            "--json",
        ])
        .unwrap();
        let Some(Commands::Summary { query, json }) = cli.command else {
            panic!("expected summary command");
        };
        assert!(json);
        assert_eq!(query.tags.len(), 2);
        assert_eq!(query.range.start, NaiveDate::from_ymd_opt(2025, 1, 27));
        assert_eq!(query.range.end, NaiveDate::from_ymd_opt(2025, 2, 2));
    }

    #[test]
    fn start_requires_tags() {
        assert!(Cli::try_parse_from(["tk", "start"]).is_err());
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(Cli::try_parse_from(["tk", "week", "--start", "27/01/2025"]).is_err());
    }
}
