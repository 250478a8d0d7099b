//! Reading finished dumps.
//!
//! [`DumpReader`] opens a dump written by a [`Container`](crate::Container),
//! walks its group tree and describes every signal. Record data is loaded on
//! demand with [`DumpReader::read`], which gathers the columns of a dataset
//! into a [`SignalData`].
//!
//! # Example
//!
//! ```rust,no_run
//! use simdump::DumpReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = DumpReader::open("./dump")?;
//! for info in reader.signals() {
//!     println!("{} {:?} {} records", info.name, info.kind, info.records);
//! }
//!
//! let data = reader.read("u_top.u_sub.data")?;
//! let values: Vec<i64> = data.values()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ContainerConfig;
use crate::container::ContainerMeta;
use crate::dataset::DatasetView;
use crate::element::{Element, ElementType, decode_slice};
use crate::error::{DatasetIoError, Result, SignalError};
use crate::hierarchy::{self, Group};
use crate::schema::{RecordSchema, StorageKind};
use crate::signal::{STORAGE_ATTRIBUTE, SignalDescriptor};

/// Attribute conventionally naming the source-language type of a signal.
pub const SVTYPE_ATTRIBUTE: &str = "svtype";

/// Description of one signal in a dump.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalInfo {
    /// Dotted signal name.
    pub name: String,
    /// Storage kind.
    pub kind: StorageKind,
    /// Payload element type, `None` for SimTime.
    pub element: Option<ElementType>,
    /// Payload dimensions, empty for scalars and SimTime.
    pub dims: Vec<usize>,
    /// Number of records in the dataset.
    ///
    /// For a signal that was not closed this is the allocated capacity;
    /// trailing records may be zero.
    pub records: u64,
    /// Whether the signal was closed cleanly.
    pub complete: bool,
    /// String attributes, including `storage`.
    pub attributes: BTreeMap<String, String>,
}

impl SignalInfo {
    /// Value of the `storage` attribute.
    pub fn storage(&self) -> Option<&str> {
        self.attributes.get(STORAGE_ATTRIBUTE).map(String::as_str)
    }

    /// Value of the `svtype` attribute, if the writer set one.
    pub fn svtype(&self) -> Option<&str> {
        self.attributes.get(SVTYPE_ATTRIBUTE).map(String::as_str)
    }
}

/// A simulation timestamp: integer nanoseconds plus a fractional remainder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTime {
    /// Whole nanoseconds.
    pub ns: i64,
    /// Fractional nanoseconds in `[0, 1)`.
    pub rem: f64,
}

impl SimTime {
    /// The timestamp as floating-point nanoseconds.
    #[allow(clippy::cast_precision_loss)] // display only; exact value is in ns + rem
    pub fn as_f64_ns(self) -> f64 {
        self.ns as f64 + self.rem
    }
}

/// All records of one signal, gathered column by column.
#[derive(Debug, Clone)]
pub struct SignalData {
    name: String,
    schema: RecordSchema,
    records: u64,
    stride: usize,
    /// Async timestamps or SimTime remainders.
    column: Option<Vec<f64>>,
    /// Packed payloads (SimTime: the ns field).
    payload: Vec<u8>,
}

impl SignalData {
    /// Dotted signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage kind.
    pub fn kind(&self) -> StorageKind {
        self.schema.kind()
    }

    /// The record schema.
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Number of records.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Payload bytes per record.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Packed little-endian payload bytes of all records.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Raw payload bytes of record `index`.
    pub fn record(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.stride)?;
        self.payload.get(start..start + self.stride)
    }

    /// Timestamps of an Async signal.
    pub fn times(&self) -> Option<&[f64]> {
        match self.schema.kind() {
            StorageKind::Async => self.column.as_deref(),
            StorageKind::Sync | StorageKind::SimTime => None,
        }
    }

    /// Decodes all payload values as `T`, flattened record after record.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::ElementMismatch`] if `T` is not the signal's
    /// element type (SimTime signals have none).
    pub fn values<T: Element>(&self) -> Result<Vec<T>> {
        let expected = self.schema.element();
        if expected != Some(T::TYPE) {
            return Err(SignalError::ElementMismatch {
                name: self.name.clone(),
                expected,
                actual: T::TYPE,
            }
            .into());
        }
        Ok(decode_slice(&self.payload))
    }

    /// Timestamps of a SimTime signal.
    pub fn sim_times(&self) -> Option<Vec<SimTime>> {
        if self.schema.kind() != StorageKind::SimTime {
            return None;
        }
        let rems = self.column.as_deref()?;
        let ns: Vec<i64> = decode_slice(&self.payload);
        Some(
            ns.into_iter()
                .zip(rems)
                .map(|(ns, &rem)| SimTime { ns, rem })
                .collect(),
        )
    }
}

/// Read-only access to a finished dump.
#[derive(Debug)]
pub struct DumpReader {
    path: PathBuf,
    root: Group,
    meta: ContainerMeta,
    signals: Vec<SignalInfo>,
}

impl DumpReader {
    /// Opens the dump at `path` and indexes all signals.
    ///
    /// # Errors
    ///
    /// - [`ContainerError`](crate::error::ContainerError) if `.container.json`
    ///   or a descriptor is missing or invalid
    /// - [`DatasetIoError`] if a dataset file is corrupted or does not match
    ///   its descriptor
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = ContainerMeta::load(&path)?;
        let root = Group::open_root(&path)?;

        if !meta.closed {
            warn!(path = %path.display(), "dump was not closed cleanly");
        }

        let mut signals = Vec::new();
        walk(&root, &mut signals)?;
        debug!(path = %path.display(), signals = signals.len(), "indexed dump");

        Ok(Self {
            path,
            root,
            meta,
            signals,
        })
    }

    /// Path of the dump root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Configuration the dump was written with.
    pub fn config(&self) -> &ContainerConfig {
        &self.meta.config
    }

    /// Whether the container was closed cleanly.
    pub fn is_complete(&self) -> bool {
        self.meta.closed
    }

    /// All signals, groups in depth-first order, names sorted within a group.
    pub fn signals(&self) -> &[SignalInfo] {
        &self.signals
    }

    /// Looks up a signal by dotted name.
    pub fn signal(&self, name: &str) -> Option<&SignalInfo> {
        let normalized = hierarchy::split_name(name).ok()?.join(".");
        self.signals.iter().find(|s| s.name == normalized)
    }

    /// Attributes of the root group.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`](crate::error::ContainerError) if the root
    /// metadata cannot be read.
    pub fn attributes(&self) -> Result<BTreeMap<String, String>> {
        self.root.attributes()
    }

    /// Attributes of the group `group` (dotted path; empty for the root).
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`](crate::error::ContainerError) if the
    /// group does not exist or its metadata cannot be read.
    pub fn group_attributes(&self, group: &str) -> Result<BTreeMap<String, String>> {
        hierarchy::lookup_group(&self.root, group)?.attributes()
    }

    /// Loads all records of the signal `name`.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::UnknownSignal`](crate::error::ContainerError::UnknownSignal)
    ///   if no such signal exists
    /// - [`DatasetIoError`] if the dataset cannot be read
    pub fn read(&self, name: &str) -> Result<SignalData> {
        let (group, leaf) = hierarchy::lookup_signal(&self.root, name)?;
        let (descriptor, view) = open_signal(&group, &leaf)?;
        let layout = &descriptor.layout;

        let column = layout
            .time
            .as_ref()
            .map(|field| view.read_f64_field(field))
            .transpose()?;
        let payload = view.read_field(&layout.payload)?;

        Ok(SignalData {
            stride: descriptor.schema.stride(),
            records: view.extent(),
            name: descriptor.name,
            schema: descriptor.schema,
            column,
            payload,
        })
    }
}

/// Collects the signals of `group` and its descendants.
fn walk(group: &Group, out: &mut Vec<SignalInfo>) -> Result<()> {
    for leaf in group.signals()? {
        let (descriptor, view) = open_signal(group, &leaf)?;
        out.push(SignalInfo {
            kind: descriptor.schema.kind(),
            element: descriptor.schema.element(),
            dims: descriptor.schema.dims().to_vec(),
            records: view.extent(),
            complete: descriptor.closed,
            name: descriptor.name,
            attributes: descriptor.attributes,
        });
    }
    for child in group.children()? {
        walk(&child, out)?;
    }
    Ok(())
}

/// Loads a signal's descriptor and maps its dataset, checking they agree.
fn open_signal(group: &Group, leaf: &str) -> Result<(SignalDescriptor, DatasetView)> {
    let descriptor = SignalDescriptor::load(&group.descriptor_path(leaf))?;
    let view = DatasetView::open(group.dataset_path(leaf))?;

    if view.record_size() != descriptor.layout.record_size {
        return Err(DatasetIoError::CorruptedDataset {
            path: view.path().to_string(),
            reason: format!(
                "record size {} does not match descriptor ({})",
                view.record_size(),
                descriptor.layout.record_size
            ),
        }
        .into());
    }
    Ok((descriptor, view))
}
