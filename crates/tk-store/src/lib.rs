//! Storage layer for the time tracker.
//!
//! Persists patches as plain files inside a *sync folder*, a directory that
//! any file synchronization service may replicate between devices.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   patches/<patch-id>.toml    one immutable file per patch
//!   meta/<device-id>.toml      the patches written by one device
//!   .locks/<device-id>.lock    advisory lock for this device's meta file
//! ```
//!
//! A device only ever writes its own meta file and new patch files, so two
//! devices never modify the same file and sync services never have to
//! resolve a write conflict.
//!
//! # Partial Sync
//!
//! A meta file may arrive before the patch files it lists. Such patches are
//! reported in [`LoadedPatches::missing`] and skipped until they show up.
//! Patch files that no meta file lists are ignored.
//!
//! # Locking
//!
//! Updates to this device's meta file happen under an exclusive `fs2` lock
//! and replace the file atomically, so concurrent `tk` invocations on one
//! machine cannot lose each other's patches.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tk_core::{Patch, PatchId};

const PATCHES_DIR: &str = "patches";
const META_DIR: &str = "meta";
const LOCKS_DIR: &str = ".locks";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An IO operation on a store file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A store file could not be parsed.
    #[error("invalid file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// A value could not be encoded as TOML.
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: toml::ser::Error,
    },
    /// The device id cannot be used as a file name.
    #[error("invalid device id {0:?}: use letters, digits, '-' or '_'")]
    InvalidDeviceId(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Per-device metadata stored in `meta/<device-id>.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Human-friendly device label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Every patch this device has written.
    #[serde(default)]
    pub patches: BTreeSet<PatchId>,
}

/// Patches read from every device.
#[derive(Debug, Clone, Default)]
pub struct LoadedPatches {
    pub patches: Vec<Patch>,
    /// Listed in some meta file but not present in `patches/` yet.
    pub missing: Vec<PatchId>,
}

/// A device's entry in the sync folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub meta: Meta,
}

/// A sync folder opened on behalf of one device.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    device_id: String,
}

/// Returns true if `id` is safe to use as a file name on every platform.
pub fn is_valid_device_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl Store {
    /// Opens the sync folder at `root`, creating its directories if needed.
    pub fn open(root: &Path, device_id: &str) -> Result<Self, StoreError> {
        if !is_valid_device_id(device_id) {
            return Err(StoreError::InvalidDeviceId(device_id.to_string()));
        }
        for dir in [PATCHES_DIR, META_DIR, LOCKS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(io_error(&path))?;
        }
        tracing::debug!(root = %root.display(), device_id, "opened store");
        Ok(Self {
            root: root.to_path_buf(),
            device_id: device_id.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn patch_path(&self, id: &PatchId) -> PathBuf {
        self.root.join(PATCHES_DIR).join(format!("{id}.toml"))
    }

    fn meta_path(&self, device_id: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{device_id}.toml"))
    }

    fn lock_path(&self) -> PathBuf {
        self.root
            .join(LOCKS_DIR)
            .join(format!("{}.lock", self.device_id))
    }

    /// Device ids that have written a meta file, sorted.
    pub fn devices(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(META_DIR);
        let mut devices = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let path = entry.map_err(io_error(&dir))?.path();
            if path.extension().is_none_or(|ext| ext != "toml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if is_valid_device_id(stem) {
                    devices.push(stem.to_string());
                }
            }
        }
        devices.sort();
        Ok(devices)
    }

    /// Reads a device's meta file. A missing file is an empty meta.
    pub fn meta(&self, device_id: &str) -> Result<Meta, StoreError> {
        let path = self.meta_path(device_id);
        match fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|source| StoreError::Decode { path, source })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Meta::default()),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    /// Every device with its meta.
    pub fn device_records(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        self.devices()?
            .into_iter()
            .map(|device_id| {
                let meta = self.meta(&device_id)?;
                Ok(DeviceRecord { device_id, meta })
            })
            .collect()
    }

    fn read_patch(&self, id: &PatchId) -> Result<Option<Patch>, StoreError> {
        let path = self.patch_path(id);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let patch: Patch =
                    toml::from_str(&content).map_err(|source| StoreError::Decode {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Some(patch))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    /// Loads every patch listed by any device.
    pub fn load_patches(&self) -> Result<LoadedPatches, StoreError> {
        let mut ids = BTreeSet::new();
        for device_id in self.devices()? {
            ids.extend(self.meta(&device_id)?.patches);
        }

        let mut loaded = LoadedPatches::default();
        for id in ids {
            match self.read_patch(&id)? {
                Some(patch) => loaded.patches.push(patch),
                None => {
                    tracing::warn!(patch = %id, "patch listed but not synced yet");
                    loaded.missing.push(id);
                }
            }
        }
        tracing::debug!(
            patches = loaded.patches.len(),
            missing = loaded.missing.len(),
            "loaded patches"
        );
        Ok(loaded)
    }

    /// Writes a new patch and records it in this device's meta file.
    pub fn add_patch(&self, patch: &Patch) -> Result<(), StoreError> {
        let path = self.patch_path(&patch.id);
        if path.exists() {
            tracing::debug!(patch = %patch.id, "patch file already present");
        } else {
            let content = toml::to_string(patch).map_err(|source| StoreError::Encode {
                what: "patch",
                source,
            })?;
            write_atomic(&path, &content)?;
        }

        self.update_meta(|meta| {
            meta.patches.insert(patch.id);
        })?;
        tracing::info!(patch = %patch.id, device = %self.device_id, "recorded patch");
        Ok(())
    }

    /// Sets the label shown for this device.
    pub fn set_label(&self, label: &str) -> Result<(), StoreError> {
        self.update_meta(|meta| meta.label = Some(label.to_string()))
    }

    fn update_meta(&self, change: impl FnOnce(&mut Meta)) -> Result<(), StoreError> {
        let lock_path = self.lock_path();
        let lock = File::create(&lock_path).map_err(io_error(&lock_path))?;
        lock.lock_exclusive().map_err(io_error(&lock_path))?;

        let mut meta = self.meta(&self.device_id)?;
        change(&mut meta);
        let content = toml::to_string(&meta).map_err(|source| StoreError::Encode {
            what: "device meta",
            source,
        })?;
        let result = write_atomic(&self.meta_path(&self.device_id), &content);

        if let Err(err) = FileExt::unlock(&lock) {
            tracing::warn!(path = %lock_path.display(), error = %err, "failed to release meta lock");
        }
        result
    }
}

/// Writes `content` next to `path` and renames it into place.
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, content).map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))?;
    Ok(())
}
