//! Top-level dump container.
//!
//! A [`Container`] owns the root group of a dump and the ordered registry of
//! [`SignalStore`]s writing into it. It is the entry point of the recorder:
//! open a dump, create and register signals, write through handles, close.
//!
//! # Design
//!
//! - `open` prepares the dump directory and writes the `.container.json` marker
//! - `create_signal` resolves the dotted name and validates the schema
//!   before creating any file
//! - `register` hands out a [`SignalHandle`] for hot-path writes
//! - `close` closes every registered store in registration order and marks
//!   the dump complete
//!
//! # File Layout
//!
//! ```text
//! dump/
//! ├── .container.json       <- format marker: version, config, closed flag
//! ├── .group.json           <- root attributes
//! ├── clk.sds               <- signal `clk` in the root group
//! ├── clk.json
//! └── u_top/
//!     ├── .group.json
//!     ├── data.sds          <- signal `u_top.data`
//!     └── data.json
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use simdump::{Container, ContainerConfig, ElementType, StorageKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut container = Container::open("./dump", ContainerConfig::default())?;
//! container.set_attribute("simulator", "xsim")?;
//!
//! let data = container.add_signal("u_top.u_sub.data", StorageKind::Sync, &[2, 3], ElementType::I64)?;
//! let time = container.add_signal("sim_time", StorageKind::SimTime, &[], ElementType::I64)?;
//!
//! for step in 0..1000i64 {
//!     container.write_values(data, 0.0, &[step; 6])?;
//!     container.write_time(time, step * 10, 0.0)?;
//! }
//!
//! let summary = container.close()?;
//! println!("{} signals written", summary.signals.len());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ContainerConfig;
use crate::element::{Element, ElementType};
use crate::error::{ContainerError, RegistrationError, Result, SimDumpError};
use crate::hierarchy::{self, Group};
use crate::schema::{SchemaBuilder, StorageKind};
use crate::signal::{SignalStore, SignalSummary};

/// Container marker format version.
pub(crate) const CONTAINER_VERSION: u32 = 1;

/// Name of the marker file in the dump root.
///
/// Signal leaves never start with a dot, so no descriptor can shadow it.
pub const CONTAINER_FILE: &str = ".container.json";

/// Source of per-container identifiers embedded in handles.
static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(0);

/// Contents of `.container.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ContainerMeta {
    /// Marker format version.
    pub version: u32,
    /// Configuration the dump was written with.
    pub config: ContainerConfig,
    /// Whether the container was closed cleanly.
    pub closed: bool,
    /// Number of registered signals at close.
    pub signals: usize,
}

impl ContainerMeta {
    /// Reads and validates the marker in `dir`.
    pub(crate) fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONTAINER_FILE);
        let text = fs::read_to_string(&path).map_err(|e| ContainerError::DirectoryAccess {
            path: path.display().to_string(),
            source: e,
        })?;
        let meta: Self = serde_json::from_str(&text).map_err(ContainerError::MetadataSerialize)?;

        if meta.version != CONTAINER_VERSION {
            return Err(ContainerError::CorruptedMetadata {
                path: path.display().to_string(),
                reason: format!(
                    "unsupported container version: expected {CONTAINER_VERSION}, found {}",
                    meta.version
                ),
            }
            .into());
        }
        Ok(meta)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONTAINER_FILE);
        let json = serde_json::to_string_pretty(self).map_err(ContainerError::MetadataSerialize)?;
        fs::write(&path, json).map_err(|e| {
            ContainerError::DirectoryAccess {
                path: path.display().to_string(),
                source: e,
            }
            .into()
        })
    }
}

/// Opaque handle to a registered signal.
///
/// Only valid for the container that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandle {
    container: u64,
    index: usize,
}

impl SignalHandle {
    /// Registration index of the signal.
    pub fn index(self) -> usize {
        self.index
    }
}

/// Final state of a closed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Path of the dump root.
    pub path: PathBuf,
    /// One summary per registered signal, in registration order.
    pub signals: Vec<SignalSummary>,
}

impl ContainerSummary {
    /// Total records written across all signals.
    pub fn total_records(&self) -> u64 {
        self.signals.iter().map(|s| s.records).sum()
    }
}

/// An open dump being recorded.
///
/// # Thread Safety
///
/// The Container is designed for single-threaded access. All mutation goes
/// through `&mut self`.
#[derive(Debug)]
pub struct Container {
    /// Identifier matched against handles.
    id: u64,
    /// Path of the dump root.
    path: PathBuf,
    /// Root group.
    root: Group,
    /// Validated configuration.
    config: ContainerConfig,
    /// Registered stores, in registration order.
    signals: Vec<SignalStore>,
    /// Set once close has started.
    closed: bool,
}

impl Container {
    /// Creates a dump at `path`.
    ///
    /// - A missing path is created.
    /// - A previous dump at the path (identified by `.container.json`) is
    ///   removed and recreated.
    /// - An existing empty directory is reused.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Invalid`](crate::error::ConfigError::Invalid) if the configuration is invalid
    /// - [`ContainerError::PathOccupied`] if the path is a file or a non-empty
    ///   directory that is not a dump
    /// - [`ContainerError::DirectoryAccess`] if the directory cannot be prepared
    pub fn open<P: AsRef<Path>>(path: P, config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        Self::prepare_directory(&path)?;
        let root = Group::create_root(&path)?;

        ContainerMeta {
            version: CONTAINER_VERSION,
            config: config.clone(),
            closed: false,
            signals: 0,
        }
        .save(&path)?;

        info!(
            path = %path.display(),
            chunk_size = config.chunk_size,
            max_signals = config.max_signals,
            "opened container"
        );

        Ok(Self {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            path,
            root,
            config,
            signals: Vec::new(),
            closed: false,
        })
    }

    /// Creates a dump at `path` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Container::open`].
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, ContainerConfig::default())
    }

    /// Makes `path` ready to become a dump root.
    fn prepare_directory(path: &Path) -> Result<()> {
        let access = |e| ContainerError::DirectoryAccess {
            path: path.display().to_string(),
            source: e,
        };

        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(access(e).into()),
        };
        let occupied = || ContainerError::PathOccupied {
            path: path.display().to_string(),
        };

        if !metadata.is_dir() {
            return Err(occupied().into());
        }

        if path.join(CONTAINER_FILE).is_file() {
            warn!(path = %path.display(), "replacing previous dump");
            fs::remove_dir_all(path).map_err(access)?;
            return Ok(());
        }

        let mut entries = fs::read_dir(path).map_err(access)?;
        if entries.next().is_some() {
            return Err(occupied().into());
        }
        Ok(())
    }

    /// Creates a signal store for `name` without registering it.
    ///
    /// The schema and the name are validated first; on failure no group,
    /// dataset or cache is created. Missing intermediate groups are created
    /// next and remain if creating the dataset itself fails.
    ///
    /// # Errors
    ///
    /// - [`SchemaError`](crate::error::SchemaError) if the dimensions are invalid
    /// - [`ContainerError::InvalidName`] if the name is malformed or collides
    ///   with a group
    /// - [`ContainerError::SignalExists`] if a signal with this name exists
    /// - [`DatasetIoError`](crate::error::DatasetIoError) if the dataset cannot be created
    pub fn create_signal(
        &self,
        name: &str,
        kind: StorageKind,
        dims: &[usize],
        element: ElementType,
    ) -> Result<SignalStore> {
        let schema = SchemaBuilder::new(self.config.max_flat_size).build(kind, dims, element)?;
        hierarchy::check_available(&self.root, name)?;
        let resolved = hierarchy::resolve(&self.root, name)?;

        SignalStore::create(&resolved, schema, self.config.chunk_size)
    }

    /// Appends `store` to the registry.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] carrying the store back, still open,
    /// if the registry already holds `max_signals` stores.
    pub fn register(
        &mut self,
        store: SignalStore,
    ) -> std::result::Result<SignalHandle, RegistrationError> {
        if self.signals.len() >= self.config.max_signals {
            warn!(
                signal = store.name(),
                max_signals = self.config.max_signals,
                "registry full"
            );
            return Err(RegistrationError {
                store: Box::new(store),
                max_signals: self.config.max_signals,
            });
        }

        let handle = SignalHandle {
            container: self.id,
            index: self.signals.len(),
        };
        debug!(signal = store.name(), index = handle.index, "registered signal");
        self.signals.push(store);
        Ok(handle)
    }

    /// Creates and registers a signal in one step.
    ///
    /// A full registry is detected before anything is created.
    ///
    /// # Errors
    ///
    /// Everything [`create_signal`](Self::create_signal) returns, plus
    /// [`ContainerError::RegistryFull`].
    pub fn add_signal(
        &mut self,
        name: &str,
        kind: StorageKind,
        dims: &[usize],
        element: ElementType,
    ) -> Result<SignalHandle> {
        if self.signals.len() >= self.config.max_signals {
            return Err(ContainerError::RegistryFull {
                max_signals: self.config.max_signals,
            }
            .into());
        }
        let store = self.create_signal(name, kind, dims, element)?;
        Ok(self.register(store)?)
    }

    /// Returns the registered store behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidHandle`] for a handle issued by
    /// another container.
    pub fn signal(&self, handle: SignalHandle) -> Result<&SignalStore> {
        if handle.container != self.id {
            return Err(ContainerError::InvalidHandle {
                index: handle.index,
            }
            .into());
        }
        self.signals.get(handle.index).ok_or_else(|| {
            ContainerError::InvalidHandle {
                index: handle.index,
            }
            .into()
        })
    }

    /// Returns the registered store behind `handle` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidHandle`] for a handle issued by
    /// another container.
    #[inline]
    pub fn signal_mut(&mut self, handle: SignalHandle) -> Result<&mut SignalStore> {
        if handle.container != self.id {
            return Err(ContainerError::InvalidHandle {
                index: handle.index,
            }
            .into());
        }
        self.signals.get_mut(handle.index).ok_or_else(|| {
            ContainerError::InvalidHandle {
                index: handle.index,
            }
            .into()
        })
    }

    /// Finds the handle of a registered signal by dotted name.
    pub fn find(&self, name: &str) -> Option<SignalHandle> {
        self.signals
            .iter()
            .position(|s| s.name() == name)
            .map(|index| SignalHandle {
                container: self.id,
                index,
            })
    }

    /// Writes one raw record; see [`SignalStore::write`].
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidHandle`] or any error of [`SignalStore::write`].
    #[inline]
    pub fn write(&mut self, handle: SignalHandle, time: f64, payload: &[u8]) -> Result<()> {
        self.signal_mut(handle)?.write(time, payload)
    }

    /// Writes one typed record; see [`SignalStore::write_values`].
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidHandle`] or any error of [`SignalStore::write_values`].
    #[inline]
    pub fn write_values<T: Element>(
        &mut self,
        handle: SignalHandle,
        time: f64,
        values: &[T],
    ) -> Result<()> {
        self.signal_mut(handle)?.write_values(time, values)
    }

    /// Writes one simulation timestamp; see [`SignalStore::write_time`].
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidHandle`] or any error of [`SignalStore::write_time`].
    #[inline]
    pub fn write_time(&mut self, handle: SignalHandle, ns: i64, rem: f64) -> Result<()> {
        self.signal_mut(handle)?.write_time(ns, rem)
    }

    /// Sets a string attribute on the root group.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if the root metadata cannot be written.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.root.set_attribute(name, value)
    }

    /// Sets a string attribute on the existing group `group` (dotted path).
    ///
    /// An empty path addresses the root.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidName`] if the group does not exist.
    pub fn set_group_attribute(&self, group: &str, name: &str, value: &str) -> Result<()> {
        hierarchy::lookup_group(&self.root, group)?.set_attribute(name, value)
    }

    /// Attributes of the root group.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if the root metadata cannot be read.
    pub fn attributes(&self) -> Result<BTreeMap<String, String>> {
        self.root.attributes()
    }

    /// Registered stores in registration order.
    pub fn signals(&self) -> impl Iterator<Item = &SignalStore> {
        self.signals.iter()
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if no signal is registered.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// The container configuration.
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// The root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Path of the dump root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes every registered store in registration order and marks the
    /// dump complete.
    ///
    /// A failing store does not stop the remaining ones from closing.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn close(mut self) -> Result<ContainerSummary> {
        self.finish()
    }

    fn finish(&mut self) -> Result<ContainerSummary> {
        self.closed = true;

        let count = self.signals.len();
        let mut summaries = Vec::with_capacity(count);
        let mut first_error: Option<SimDumpError> = None;

        for store in self.signals.drain(..) {
            let name = store.name().to_string();
            match store.close() {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(signal = %name, "failed to close signal: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        let marker = ContainerMeta {
            version: CONTAINER_VERSION,
            config: self.config.clone(),
            closed: first_error.is_none(),
            signals: count,
        };
        if let Err(e) = marker.save(&self.path) {
            error!(path = %self.path.display(), "failed to update container marker: {e}");
            first_error.get_or_insert(e);
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let summary = ContainerSummary {
            path: self.path.clone(),
            signals: summaries,
        };
        info!(
            path = %self.path.display(),
            signals = count,
            records = summary.total_records(),
            "closed container"
        );
        Ok(summary)
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(path = %self.path.display(), "container dropped without close");
        if let Err(e) = self.finish() {
            error!(path = %self.path.display(), "failed to close dropped container: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SchemaError, SignalError};
    use tempfile::tempdir;

    fn small_config() -> ContainerConfig {
        ContainerConfig {
            chunk_size: 4,
            max_signals: 2,
            max_flat_size: 16,
        }
    }

    #[test]
    fn test_open_creates_marker_and_root() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dump");

        let container = Container::open(&path, small_config()).unwrap();
        assert!(path.join(CONTAINER_FILE).is_file());
        assert!(path.join(hierarchy::GROUP_FILE).is_file());
        assert_eq!(container.path(), path);
        assert!(container.is_empty());

        let meta = ContainerMeta::load(&path).unwrap();
        assert!(!meta.closed);
        assert_eq!(meta.config, small_config());
    }

    #[test]
    fn test_open_replaces_previous_dump() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dump");

        let mut first = Container::open(&path, small_config()).unwrap();
        first
            .add_signal("old.sig", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();
        first.close().unwrap();
        assert!(path.join("old/sig.sds").exists());

        let second = Container::open(&path, small_config()).unwrap();
        assert!(!path.join("old").exists());
        second.close().unwrap();
    }

    #[test]
    fn test_open_reuses_empty_directory_and_rejects_others() {
        let temp_dir = tempdir().unwrap();

        let empty = temp_dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        Container::open(&empty, small_config()).unwrap().close().unwrap();

        let busy = temp_dir.path().join("busy");
        fs::create_dir(&busy).unwrap();
        fs::write(busy.join("notes.txt"), "keep me").unwrap();
        match Container::open(&busy, small_config()) {
            Err(SimDumpError::Container(ContainerError::PathOccupied { .. })) => {}
            other => panic!("Expected PathOccupied, got: {other:?}"),
        }
        assert!(busy.join("notes.txt").exists());

        let file = temp_dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            Container::open(&file, small_config()),
            Err(SimDumpError::Container(ContainerError::PathOccupied { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = tempdir().unwrap();
        let config = ContainerConfig {
            chunk_size: 0,
            ..small_config()
        };
        assert!(matches!(
            Container::open(temp_dir.path().join("dump"), config),
            Err(SimDumpError::Config(_))
        ));
        assert!(!temp_dir.path().join("dump").exists());
    }

    #[test]
    fn test_schema_failure_has_no_side_effects() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dump");
        let container = Container::open(&path, small_config()).unwrap();

        match container.create_signal("a.b.sig", StorageKind::Async, &[4, 5], ElementType::F32) {
            Err(SimDumpError::Schema(SchemaError::FlatSizeExceeded {
                flat_size: 20,
                max_flat_size: 16,
            })) => {}
            other => panic!("Expected FlatSizeExceeded, got: {other:?}"),
        }
        assert!(!path.join("a").exists());
        assert!(container.is_empty());
    }

    #[test]
    fn test_duplicate_and_shadowing_names() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dump");
        let mut container = Container::open(&path, small_config()).unwrap();
        container
            .add_signal("top.sig", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();

        assert!(matches!(
            container.create_signal("top..sig", StorageKind::Sync, &[], ElementType::U8),
            Err(SimDumpError::Container(ContainerError::SignalExists { .. }))
        ));
        assert!(matches!(
            container.create_signal("top", StorageKind::Sync, &[], ElementType::U8),
            Err(SimDumpError::Container(ContainerError::InvalidName { .. }))
        ));
        assert!(matches!(
            container.create_signal("top.sig.inner.leaf", StorageKind::Sync, &[], ElementType::U8),
            Err(SimDumpError::Container(ContainerError::InvalidName { .. }))
        ));
        assert!(!path.join("top").join("sig").exists());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_registry_full_returns_store() {
        let temp_dir = tempdir().unwrap();
        let mut container = Container::open(temp_dir.path().join("dump"), small_config()).unwrap();
        container
            .add_signal("a", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();
        container
            .add_signal("b", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();

        let extra = container
            .create_signal("c", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();
        let err = container.register(extra).unwrap_err();
        assert_eq!(err.max_signals, 2);
        assert_eq!(container.len(), 2);

        let mut store = err.into_store();
        store.write(0.0, &[7]).unwrap();
        assert_eq!(store.close().unwrap().records, 1);

        assert!(matches!(
            container.add_signal("d", StorageKind::Sync, &[], ElementType::U8),
            Err(SimDumpError::Container(ContainerError::RegistryFull { max_signals: 2 }))
        ));
        assert!(!container.path().join("d.sds").exists());
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let temp_dir = tempdir().unwrap();
        let mut one = Container::open(temp_dir.path().join("one"), small_config()).unwrap();
        let mut two = Container::open(temp_dir.path().join("two"), small_config()).unwrap();
        let handle = one
            .add_signal("sig", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();
        two.add_signal("sig", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();

        assert!(matches!(
            two.write(handle, 0.0, &[1]),
            Err(SimDumpError::Container(ContainerError::InvalidHandle { index: 0 }))
        ));
        one.write(handle, 0.0, &[1]).unwrap();
        assert_eq!(one.find("sig"), Some(handle));
    }

    #[test]
    fn test_write_by_handle_and_close_summary() {
        let temp_dir = tempdir().unwrap();
        let mut container = Container::open(temp_dir.path().join("dump"), small_config()).unwrap();
        let data = container
            .add_signal("u_top.data", StorageKind::Async, &[2], ElementType::I16)
            .unwrap();
        let time = container
            .add_signal("time", StorageKind::SimTime, &[], ElementType::I64)
            .unwrap();

        for step in 0..9i16 {
            container.write_values(data, f64::from(step), &[step, -step]).unwrap();
            container.write_time(time, i64::from(step) * 10, 0.5).unwrap();
        }
        assert!(matches!(
            container.write_time(data, 0, 0.0),
            Err(SimDumpError::Signal(SignalError::KindMismatch { .. }))
        ));

        let path = container.path().to_path_buf();
        let summary = container.close().unwrap();
        assert_eq!(summary.signals.len(), 2);
        assert_eq!(summary.signals[0].name, "u_top.data");
        assert_eq!(summary.total_records(), 18);
        assert!(ContainerMeta::load(&path).unwrap().closed);
    }

    #[test]
    fn test_group_attributes() {
        let temp_dir = tempdir().unwrap();
        let mut container = Container::open(temp_dir.path().join("dump"), small_config()).unwrap();
        container
            .add_signal("u_top.u_sub.sig", StorageKind::Sync, &[], ElementType::U8)
            .unwrap();

        container.set_attribute("simulator", "xsim").unwrap();
        container
            .set_group_attribute("u_top.u_sub", "module", "sub")
            .unwrap();
        assert!(container.set_group_attribute("nope", "k", "v").is_err());

        assert_eq!(container.attributes().unwrap()["simulator"], "xsim");
        let group = hierarchy::lookup_group(container.root(), "u_top.u_sub").unwrap();
        assert_eq!(group.attributes().unwrap()["module"], "sub");
    }

    #[test]
    fn test_drop_without_close_finishes_dump() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dump");
        {
            let mut container = Container::open(&path, small_config()).unwrap();
            let handle = container
                .add_signal("sig", StorageKind::Sync, &[], ElementType::U8)
                .unwrap();
            container.write(handle, 0.0, &[3]).unwrap();
        }
        assert!(ContainerMeta::load(&path).unwrap().closed);
    }
}
