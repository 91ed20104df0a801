//! Device identity.
//!
//! Each installation gets a persistent UUID stored in `device.json`. The
//! UUID names this device's meta file in the sync folder, so two devices
//! never write to the same file.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Config;

/// Contents of `device.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    /// Shown by `tk devices` (e.g., "laptop").
    pub label: String,
}

impl DeviceIdentity {
    fn generate(label: String) -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            label,
        }
    }

    /// Reads an identity, or `None` if `path` does not exist yet.
    fn read(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize identity")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Where `device.json` lives: the platform data directory.
pub fn device_json_path() -> Result<PathBuf> {
    let data_dir = crate::config::dirs_data_path().context("could not determine data directory")?;
    Ok(data_dir.join("device.json"))
}

/// The host name, used as the label when none is given.
fn host_label() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolves the device id to write under.
///
/// A `device_id` in the configuration takes precedence over `device.json`.
pub fn require_device_id(config: &Config) -> Result<String> {
    let device_id = match &config.device_id {
        Some(id) => id.clone(),
        None => {
            DeviceIdentity::read(&device_json_path()?)?
                .context("No device identity found. Run 'tk init' first.")?
                .device_id
        }
    };
    if !tk_store::is_valid_device_id(&device_id) {
        bail!("invalid device id {device_id:?}: use letters, digits, '-' and '_' only");
    }
    Ok(device_id)
}

/// Creates the identity at `path` if needed and applies a new label.
pub(crate) fn init_device_at(path: &Path, label: Option<&str>) -> Result<DeviceIdentity> {
    let label = label.map(str::trim);
    if label.is_some_and(str::is_empty) {
        bail!("device label cannot be empty");
    }

    match DeviceIdentity::read(path)? {
        Some(mut identity) => {
            if let Some(label) = label.filter(|label| *label != identity.label) {
                identity.label = label.to_string();
                identity.write(path)?;
                tracing::info!(label, "updated device label");
            }
            Ok(identity)
        }
        None => {
            let identity =
                DeviceIdentity::generate(label.map_or_else(host_label, ToString::to_string));
            identity.write(path)?;
            tracing::info!(device_id = %identity.device_id, "created device identity");
            Ok(identity)
        }
    }
}
