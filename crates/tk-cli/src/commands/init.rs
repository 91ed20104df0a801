//! Init command for establishing device identity.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tk_store::Store;

use crate::Config;
use crate::device;

/// Runs the init command.
pub fn run<W: Write>(writer: &mut W, config: &Config, label: Option<&str>) -> Result<()> {
    run_at(writer, config, &device::device_json_path()?, label)
}

/// Runs the init command with the identity stored at `identity_path`.
pub(crate) fn run_at<W: Write>(
    writer: &mut W,
    config: &Config,
    identity_path: &Path,
    label: Option<&str>,
) -> Result<()> {
    let identity = device::init_device_at(identity_path, label)?;
    let device_id = config.device_id.as_deref().unwrap_or(&identity.device_id);

    let store = Store::open(&config.sync_folder, device_id).with_context(|| {
        format!("failed to open sync folder {}", config.sync_folder.display())
    })?;
    store
        .set_label(&identity.label)
        .context("failed to record device label")?;

    writeln!(writer, "Device ID:   {device_id}")?;
    writeln!(writer, "Label:       {}", identity.label)?;
    writeln!(writer, "Saved to:    {}", identity_path.display())?;
    writeln!(writer, "Sync folder: {}", config.sync_folder.display())?;

    Ok(())
}
