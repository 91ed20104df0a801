//! Devices command for listing everyone writing to the sync folder.

use std::io::Write;

use anyhow::{Context, Result};

use crate::Config;
use crate::tracker::Tracker;

/// Runs the devices command.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let tracker = Tracker::open(config)?;
    let store = tracker.store();
    let records = store
        .device_records()
        .context("failed to read device metadata")?;

    if records.is_empty() {
        writeln!(
            writer,
            "No devices have written to the sync folder yet. Run 'tk start <tags>' to begin."
        )?;
        return Ok(());
    }

    writeln!(writer, "{:<38} {:<20} PATCHES", "DEVICE ID", "LABEL")?;
    for record in &records {
        let label = record.meta.label.as_deref().unwrap_or("-");
        let marker = if record.device_id == store.device_id() {
            "  (this device)"
        } else {
            ""
        };
        writeln!(
            writer,
            "{:<38} {:<20} {}{marker}",
            record.device_id,
            label,
            record.meta.patches.len()
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::start::start;
    use crate::commands::testing::{at, config, render, tags};
    use chrono::Utc;
    use insta::assert_snapshot;
    use tk_store::Store;

    #[test]
    fn lists_devices_with_patch_counts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        render(|w| start(w, &config, &tags(&["work"]), Some("09:00"), at(27, 12, 0), &Utc));
        Store::open(&config.sync_folder, "desktop")
            .unwrap()
            .set_label("office")
            .unwrap();

        let output = render(|w| run(w, &config));
        assert_snapshot!(output, @r"
        DEVICE ID                              LABEL                PATCHES
        desktop                                office               0
        laptop                                 -                    1  (this device)
        ");
    }

    #[test]
    fn empty_sync_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let output = render(|w| run(w, &config));
        assert!(output.starts_with("No devices have written"));
    }
}
