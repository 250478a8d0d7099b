//! Per-signal buffered storage.
//!
//! A [`SignalStore`] owns everything needed to record one signal: its
//! immutable [`RecordSchema`], a [`CacheBuffer`] that stages records, and the
//! backing [`Dataset`]. Writes land in the cache; whenever the cache fills up
//! it is flushed to the dataset in two field-wise sub-range writes, and the
//! dataset grows by one chunk.
//!
//! # Bookkeeping
//!
//! ```text
//!            write_pointer          write_pointer + cache_pointer
//!                 v                       v
//! dataset  [ committed records | staged in cache ... | zeroed slack ]
//!          0                                                     capacity
//! ```
//!
//! - `write_pointer + cache_pointer` is the number of records ever appended.
//! - `capacity` is a multiple of the chunk size and never below
//!   `write_pointer + chunk_size` while the store is open.
//! - [`SignalStore::close`] flushes the remainder and shrinks the dataset to
//!   exactly `write_pointer` records.
//!
//! A store dropped without `close` is closed best-effort by its `Drop` impl.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::cache::CacheBuffer;
use crate::dataset::Dataset;
use crate::element::{Element, ElementType, encode_slice};
use crate::error::{ConfigError, ContainerError, Result, SignalError, SimDumpError};
use crate::hierarchy::Resolved;
use crate::schema::{RecordLayout, RecordSchema, StorageKind};

/// Descriptor file format version.
pub(crate) const DESCRIPTOR_VERSION: u32 = 1;

/// Attribute attached to every dataset naming its storage kind.
pub const STORAGE_ATTRIBUTE: &str = "storage";

/// Self-describing metadata persisted next to every dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SignalDescriptor {
    /// Descriptor format version.
    pub version: u32,
    /// Dotted signal name.
    pub name: String,
    /// The record schema.
    pub schema: RecordSchema,
    /// Byte layout of a record.
    pub layout: RecordLayout,
    /// Chunk size the signal was written with.
    pub chunk_size: u64,
    /// Committed records as of the last descriptor update.
    pub records: u64,
    /// Whether the signal was closed cleanly.
    pub closed: bool,
    /// String attributes.
    pub attributes: BTreeMap<String, String>,
}

impl SignalDescriptor {
    /// Reads a descriptor from `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ContainerError::DirectoryAccess {
            path: path.display().to_string(),
            source: e,
        })?;
        let descriptor: Self =
            serde_json::from_str(&text).map_err(ContainerError::MetadataSerialize)?;

        if descriptor.version != DESCRIPTOR_VERSION {
            return Err(ContainerError::CorruptedMetadata {
                path: path.display().to_string(),
                reason: format!(
                    "unsupported descriptor version: expected {DESCRIPTOR_VERSION}, found {}",
                    descriptor.version
                ),
            }
            .into());
        }
        Ok(descriptor)
    }

    /// Writes the descriptor to `path`.
    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(ContainerError::MetadataSerialize)?;
        fs::write(path, json).map_err(|e| {
            ContainerError::DirectoryAccess {
                path: path.display().to_string(),
                source: e,
            }
            .into()
        })
    }
}

/// Flush and growth counters of one signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Flushes triggered by a full cache.
    pub full_flushes: u64,
    /// Flushes of a partial cache at close (zero or one).
    pub final_flushes: u64,
    /// Number of times the dataset was extended.
    pub extensions: u64,
}

/// Final state of a closed signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSummary {
    /// Dotted signal name.
    pub name: String,
    /// Storage kind.
    pub kind: StorageKind,
    /// Total records committed, equal to the final dataset extent.
    pub records: u64,
    /// Flush and growth counters.
    pub stats: FlushStats,
}

/// Buffered, append-only storage for one signal.
///
/// Created through [`Container::create_signal`](crate::Container::create_signal).
#[derive(Debug)]
pub struct SignalStore {
    /// Dotted signal name.
    name: String,
    /// Immutable record schema.
    schema: RecordSchema,
    /// Record layout derived from the schema.
    layout: RecordLayout,
    /// Staging cache.
    cache: CacheBuffer,
    /// Backing dataset.
    dataset: Dataset,
    /// Persistent metadata, rewritten on attribute changes and close.
    descriptor: SignalDescriptor,
    /// Where the descriptor lives.
    descriptor_path: PathBuf,
    /// Records committed to the dataset.
    write_pointer: u64,
    /// Flush and growth counters.
    stats: FlushStats,
    /// Set once close has started; no further flushes happen afterwards.
    closed: bool,
}

impl SignalStore {
    /// Creates the dataset and descriptor for a resolved signal name.
    ///
    /// The dataset starts with a capacity of one chunk and the cache holds
    /// one chunk of records. The caller has already checked that the name
    /// is free.
    pub(crate) fn create(
        resolved: &Resolved,
        schema: RecordSchema,
        chunk_size: u64,
    ) -> Result<Self> {
        let chunk_records = usize::try_from(chunk_size).map_err(|_| ConfigError::Invalid {
            reason: format!("chunk_size {chunk_size} does not fit in memory"),
        })?;
        let layout = schema.layout();
        let dataset_path = resolved.group.dataset_path(&resolved.leaf);
        let descriptor_path = resolved.group.descriptor_path(&resolved.leaf);

        let dataset = Dataset::create(&dataset_path, layout.record_size, chunk_size, chunk_size)?;

        let mut attributes = BTreeMap::new();
        attributes.insert(
            STORAGE_ATTRIBUTE.to_string(),
            schema.kind().attribute_value().to_string(),
        );
        let descriptor = SignalDescriptor {
            version: DESCRIPTOR_VERSION,
            name: resolved.full_name.clone(),
            schema: schema.clone(),
            layout: layout.clone(),
            chunk_size,
            records: 0,
            closed: false,
            attributes,
        };

        if let Err(e) = descriptor.save(&descriptor_path) {
            drop(dataset);
            if let Err(cleanup) = fs::remove_file(&dataset_path) {
                warn!(path = %dataset_path.display(), "failed to remove orphaned dataset: {cleanup}");
            }
            return Err(e);
        }

        let cache = CacheBuffer::new(schema.stride(), chunk_records, schema.has_time_column());

        debug!(
            signal = %resolved.full_name,
            kind = ?schema.kind(),
            stride = schema.stride(),
            record_size = layout.record_size,
            "created signal"
        );

        Ok(Self {
            name: resolved.full_name.clone(),
            schema,
            layout,
            cache,
            dataset,
            descriptor,
            descriptor_path,
            write_pointer: 0,
            stats: FlushStats::default(),
            closed: false,
        })
    }

    /// Appends one record to a Sync or Async signal.
    ///
    /// `time` is ignored for Sync signals. `payload` must be exactly one
    /// stride long and is copied as-is; element values are expected in little
    /// endian order. Use [`write_values`](Self::write_values) for typed data.
    ///
    /// If the cache fills up, it is flushed before this call returns. A
    /// failed flush keeps the records staged and is retried by the next write
    /// or by [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// - [`SignalError::KindMismatch`] for a SimTime signal
    /// - [`SignalError::PayloadSize`] if the payload length is wrong
    /// - [`DatasetIoError`](crate::error::DatasetIoError) if a flush fails.
    ///   The record was staged anyway and must not be written again.
    #[inline]
    pub fn write(&mut self, time: f64, payload: &[u8]) -> Result<()> {
        self.expect_payload_kind("write")?;

        let stride = self.cache.stride();
        if payload.len() != stride {
            return Err(SignalError::PayloadSize {
                name: self.name.clone(),
                expected: stride,
                actual: payload.len(),
            }
            .into());
        }

        self.stage(time, |slot| slot.copy_from_slice(payload))
    }

    /// Appends one record from typed values, flattened in row-major order.
    ///
    /// # Errors
    ///
    /// - [`SignalError::KindMismatch`] for a SimTime signal
    /// - [`SignalError::ElementMismatch`] if `T` is not the signal's element type
    /// - [`SignalError::PayloadSize`] if `values` is not one full payload
    /// - [`DatasetIoError`](crate::error::DatasetIoError) if a flush fails.
    ///   The record was staged anyway and must not be written again.
    pub fn write_values<T: Element>(&mut self, time: f64, values: &[T]) -> Result<()> {
        self.expect_payload_kind("write_values")?;

        let expected = self.schema.element();
        if expected != Some(T::TYPE) {
            return Err(SignalError::ElementMismatch {
                name: self.name.clone(),
                expected,
                actual: T::TYPE,
            }
            .into());
        }

        let stride = self.cache.stride();
        let actual = values.len() * T::TYPE.size();
        if actual != stride {
            return Err(SignalError::PayloadSize {
                name: self.name.clone(),
                expected: stride,
                actual,
            }
            .into());
        }

        self.stage(time, |slot| encode_slice(values, slot))
    }

    /// Appends one simulation timestamp to a SimTime signal.
    ///
    /// # Errors
    ///
    /// - [`SignalError::KindMismatch`] if the signal is not SimTime; no state changes
    /// - [`DatasetIoError`](crate::error::DatasetIoError) if a flush fails.
    ///   The timestamp was staged anyway and must not be written again.
    pub fn write_time(&mut self, ns: i64, rem: f64) -> Result<()> {
        if self.schema.kind() != StorageKind::SimTime {
            return Err(self.kind_mismatch("write_time"));
        }
        self.stage(rem, |slot| slot.copy_from_slice(&ns.to_le_bytes()))
    }

    /// Sets a string attribute on the dataset, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if the descriptor cannot be written.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.descriptor
            .attributes
            .insert(name.to_string(), value.to_string());
        self.descriptor.save(&self.descriptor_path)
    }

    /// Flushes, shrinks the dataset to the committed records, and releases
    /// the cache and mapping.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator failure. The store is consumed either
    /// way; records that could not be flushed are lost.
    pub fn close(mut self) -> Result<SignalSummary> {
        self.finish()?;
        Ok(self.summary())
    }

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

    /// The on-disk record layout.
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Element type of the payload, `None` for SimTime.
    pub fn element(&self) -> Option<ElementType> {
        self.schema.element()
    }

    /// Payload bytes per record.
    pub fn stride(&self) -> usize {
        self.cache.stride()
    }

    /// Records committed to the dataset.
    pub fn write_pointer(&self) -> u64 {
        self.write_pointer
    }

    /// Records staged in the cache.
    pub fn cache_pointer(&self) -> usize {
        self.cache.len()
    }

    /// Total records appended so far.
    pub fn records(&self) -> u64 {
        self.write_pointer + self.cache.len() as u64
    }

    /// Current dataset capacity in records.
    pub fn capacity(&self) -> u64 {
        self.dataset.extent()
    }

    /// Chunk size in records.
    pub fn chunk_size(&self) -> u64 {
        self.dataset.chunk_size()
    }

    /// Flush and growth counters.
    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// The dataset's attributes, including `storage`.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.descriptor.attributes
    }

    fn expect_payload_kind(&self, operation: &'static str) -> Result<()> {
        match self.schema.kind() {
            StorageKind::Sync | StorageKind::Async => Ok(()),
            StorageKind::SimTime => Err(self.kind_mismatch(operation)),
        }
    }

    fn kind_mismatch(&self, operation: &'static str) -> SimDumpError {
        SignalError::KindMismatch {
            name: self.name.clone(),
            kind: self.schema.kind(),
            operation,
        }
        .into()
    }

    /// Stages one record and flushes if the cache fills up.
    ///
    /// A flush error after the append leaves the record staged.
    fn stage(&mut self, time: f64, encode: impl FnOnce(&mut [u8])) -> Result<()> {
        // A previous flush failed; retry before taking more data.
        if self.cache.is_full() {
            self.flush_full()?;
        }

        self.cache.append_with(time, encode)?;

        if self.cache.is_full() {
            self.flush_full()?;
        }
        Ok(())
    }

    /// Flushes a full cache and grows the dataset by one chunk.
    fn flush_full(&mut self) -> Result<()> {
        self.flush()?;
        self.stats.full_flushes += 1;

        let target = self.dataset.extent() + self.dataset.chunk_size();
        self.dataset.set_extent(target)?;
        self.stats.extensions += 1;
        debug!(signal = %self.name, capacity = target, "extended dataset");
        Ok(())
    }

    /// Writes all staged records at the write pointer.
    ///
    /// Returns the number of records flushed.
    fn flush(&mut self) -> Result<usize> {
        let count = self.cache.len();
        if count == 0 {
            return Ok(0);
        }

        let end = self.write_pointer + count as u64;
        if end > self.dataset.extent() {
            // Only reachable after a failed extension.
            let chunk_size = self.dataset.chunk_size();
            let target = end.div_ceil(chunk_size) * chunk_size;
            warn!(
                signal = %self.name,
                path = self.dataset.path(),
                capacity = target,
                "repairing dataset capacity before flush"
            );
            self.dataset.set_extent(target)?;
            self.stats.extensions += 1;
        }

        if let (Some(field), Some(times)) = (self.layout.time.as_ref(), self.cache.times()) {
            self.dataset.write_f64_field(field, self.write_pointer, times)?;
        }
        self.dataset
            .write_field(&self.layout.payload, self.write_pointer, self.cache.payload())?;

        self.write_pointer = end;
        self.cache.clear();
        trace!(signal = %self.name, records = count, write_pointer = end, "flushed cache");
        Ok(count)
    }

    /// Runs the close sequence once.
    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.flush()? > 0 {
            self.stats.final_flushes += 1;
        }

        self.dataset.set_extent(self.write_pointer)?;
        self.dataset.flush()?;

        self.descriptor.records = self.write_pointer;
        self.descriptor.closed = true;
        self.descriptor.save(&self.descriptor_path)?;

        debug!(
            signal = %self.name,
            records = self.write_pointer,
            full_flushes = self.stats.full_flushes,
            "closed signal"
        );
        Ok(())
    }

    fn summary(&self) -> SignalSummary {
        SignalSummary {
            name: self.name.clone(),
            kind: self.schema.kind(),
            records: self.write_pointer,
            stats: self.stats,
        }
    }
}

impl Drop for SignalStore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.finish() {
            Ok(()) => warn!(signal = %self.name, "signal dropped without close; flushed"),
            Err(e) => error!(
                signal = %self.name,
                path = self.dataset.path(),
                "failed to close dropped signal: {e}"
            ),
        }
    }
}
