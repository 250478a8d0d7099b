//! Extensible, memory-mapped record datasets.
//!
//! A dataset is a single file holding a one-dimensional array of fixed-size
//! records. Its logical length (the *extent*) can be grown and shrunk; the
//! file is resized and remapped accordingly. Records are written field by
//! field, so the timestamp column and the payload of a batch can be written
//! as two independent sub-range writes.
//!
//! # File Format
//!
//! ```text
//! [0..64)                      Header (DatasetHeader)
//! [64..64+extent*record_size)  Records, each laid out per RecordLayout
//! ```
//!
//! Header fields (little endian):
//!
//! ```text
//! [0..4)    magic "SDDS"
//! [4..8)    format version (u32)
//! [8..12)   record size in bytes (u32)
//! [12..16)  reserved
//! [16..24)  chunk size in records (u64)
//! [24..32)  extent in records (u64)
//! [32..64)  reserved
//! ```
//!
//! # Safety
//!
//! Mapping a file is unsafe because another process could truncate it while
//! mapped. Datasets are created exclusively by their owning signal and are
//! not shared while open.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapMut};

use crate::error::{DatasetIoError, Result};
use crate::schema::Field;

/// Magic bytes identifying a dataset file.
const DATASET_MAGIC: [u8; 4] = *b"SDDS";

/// Current dataset format version.
const DATASET_VERSION: u32 = 1;

/// Size of the dataset header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Decoded dataset header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DatasetHeader {
    /// Size of one record in bytes.
    record_size: u32,
    /// Growth increment in records.
    chunk_size: u64,
    /// Logical length in records.
    extent: u64,
}

impl DatasetHeader {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&DATASET_MAGIC);
        bytes[4..8].copy_from_slice(&DATASET_VERSION.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.record_size.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.chunk_size.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.extent.to_le_bytes());
        bytes
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::CorruptedDataset`] if the bytes are too short
    /// or the magic or version do not match.
    fn decode(bytes: &[u8], path: &str) -> Result<Self> {
        let corrupted = |reason: String| DatasetIoError::CorruptedDataset {
            path: path.to_string(),
            reason,
        };

        if bytes.len() < HEADER_SIZE {
            return Err(corrupted(format!(
                "file too small: {} bytes, expected at least {HEADER_SIZE}",
                bytes.len()
            ))
            .into());
        }

        if bytes[0..4] != DATASET_MAGIC {
            return Err(corrupted(format!(
                "invalid magic bytes: expected {DATASET_MAGIC:?}, found {:?}",
                &bytes[0..4]
            ))
            .into());
        }

        let version = u32::from_le_bytes(read_array(&bytes[4..8]));
        if version != DATASET_VERSION {
            return Err(corrupted(format!(
                "unsupported version: expected {DATASET_VERSION}, found {version}"
            ))
            .into());
        }

        let header = Self {
            record_size: u32::from_le_bytes(read_array(&bytes[8..12])),
            chunk_size: u64::from_le_bytes(read_array(&bytes[16..24])),
            extent: u64::from_le_bytes(read_array(&bytes[24..32])),
        };

        if header.record_size == 0 {
            return Err(corrupted("record size is zero".to_string()).into());
        }

        Ok(header)
    }

    /// Byte length of a file holding `extent` records.
    fn file_len(&self, extent: u64) -> Option<u64> {
        extent
            .checked_mul(u64::from(self.record_size))?
            .checked_add(HEADER_SIZE as u64)
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// A writable dataset file.
///
/// Owned by exactly one [`SignalStore`](crate::SignalStore); all writes go
/// through bounds-checked field writes.
#[derive(Debug)]
pub struct Dataset {
    /// Open handle used for resizing.
    file: File,
    /// Mutable mapping of the whole file.
    mmap: MmapMut,
    /// Current header values.
    header: DatasetHeader,
    /// Path to the file (for error reporting).
    path: String,
}

impl Dataset {
    /// Creates a new dataset file with `extent` zeroed records.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::WriteFailed`] if the file already exists or
    /// cannot be created, sized or mapped.
    pub fn create<P: AsRef<Path>>(
        path: P,
        record_size: usize,
        chunk_size: u64,
        extent: u64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        let record_size = u32::try_from(record_size).map_err(|_| DatasetIoError::CorruptedDataset {
            path: path_str.clone(),
            reason: format!("record size {record_size} does not fit the header"),
        })?;
        let header = DatasetHeader {
            record_size,
            chunk_size,
            extent,
        };
        let file_len = header.file_len(extent).ok_or_else(|| DatasetIoError::BoundsViolation {
            start: 0,
            end: extent,
            extent: 0,
        })?;

        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| DatasetIoError::WriteFailed {
                path: path_str.clone(),
                source: e,
            })?;

        file.set_len(file_len).map_err(|e| DatasetIoError::WriteFailed {
            path: path_str.clone(),
            source: e,
        })?;

        let mut mmap = Self::map_file(&file, &path_str)?;
        mmap[..HEADER_SIZE].copy_from_slice(&header.encode());

        Ok(Self {
            file,
            mmap,
            header,
            path: path_str,
        })
    }

    fn map_file(file: &File, path: &str) -> Result<MmapMut> {
        // SAFETY: the file was created by this process with create_new and is
        // owned exclusively by this Dataset; nothing else resizes it while mapped.
        unsafe {
            MmapMut::map_mut(file).map_err(|e| {
                DatasetIoError::WriteFailed {
                    path: path.to_string(),
                    source: e,
                }
                .into()
            })
        }
    }

    /// Current logical length in records.
    pub fn extent(&self) -> u64 {
        self.header.extent
    }

    /// Record size in bytes.
    pub fn record_size(&self) -> usize {
        self.header.record_size as usize
    }

    /// Growth increment in records.
    pub fn chunk_size(&self) -> u64 {
        self.header.chunk_size
    }

    /// Path to the dataset file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resizes the dataset to `extent` records.
    ///
    /// Growing appends zeroed records; shrinking discards trailing records.
    /// On failure the previous extent stays in effect.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::WriteFailed`] if the file cannot be resized
    /// or remapped.
    pub fn set_extent(&mut self, extent: u64) -> Result<()> {
        if extent == self.header.extent {
            return Ok(());
        }

        let file_len = self
            .header
            .file_len(extent)
            .ok_or(DatasetIoError::BoundsViolation {
                start: 0,
                end: extent,
                extent: self.header.extent,
            })?;
        let write_failed = |e| DatasetIoError::WriteFailed {
            path: self.path.clone(),
            source: e,
        };

        // Unmap before truncating so no mapped page outlives the file.
        let placeholder = MmapMut::map_anon(1).map_err(write_failed)?;
        drop(std::mem::replace(&mut self.mmap, placeholder));

        let resized = self.file.set_len(file_len).map_err(write_failed);
        self.mmap = Self::map_file(&self.file, &self.path)?;
        resized?;

        self.header.extent = extent;
        self.mmap[..HEADER_SIZE].copy_from_slice(&self.header.encode());
        Ok(())
    }

    /// Writes one field of the records `start..start + n` from `src`.
    ///
    /// `src` holds `n` consecutive field values of `field.size` bytes each.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::BoundsViolation`] if the range exceeds the
    /// extent or the field does not fit the record.
    pub fn write_field(&mut self, field: &Field, start: u64, src: &[u8]) -> Result<()> {
        if field.size == 0 {
            return Ok(());
        }
        let count = src.len() / field.size;
        let first = self.checked_range(field, start, count)?;
        let record_size = self.record_size();

        for (i, value) in src.chunks_exact(field.size).enumerate() {
            let offset = first + i * record_size;
            self.mmap[offset..offset + field.size].copy_from_slice(value);
        }
        Ok(())
    }

    /// Writes an f64 field of the records `start..start + values.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::BoundsViolation`] if the range exceeds the
    /// extent or the field does not fit the record.
    pub fn write_f64_field(&mut self, field: &Field, start: u64, values: &[f64]) -> Result<()> {
        let first = self.checked_range(field, start, values.len())?;
        let record_size = self.record_size();

        for (i, value) in values.iter().enumerate() {
            let offset = first + i * record_size;
            self.mmap[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Validates a field write and returns the byte offset of its first value.
    fn checked_range(&self, field: &Field, start: u64, count: usize) -> Result<usize> {
        let end = start.saturating_add(count as u64);
        let violation = DatasetIoError::BoundsViolation {
            start,
            end,
            extent: self.header.extent,
        };

        if end > self.header.extent || field.offset + field.size > self.record_size() {
            return Err(violation.into());
        }

        let first = usize::try_from(start)
            .ok()
            .and_then(|s| s.checked_mul(self.record_size()))
            .and_then(|b| b.checked_add(HEADER_SIZE + field.offset));
        let last_end = usize::try_from(end)
            .ok()
            .and_then(|e| e.checked_mul(self.record_size()))
            .and_then(|b| b.checked_add(HEADER_SIZE));

        // The mapping can lag the header if a remap failed.
        match (first, last_end) {
            (Some(first), Some(last_end)) if last_end <= self.mmap.len() => Ok(first),
            _ => Err(violation.into()),
        }
    }

    /// Flushes mapped pages to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::SyncFailed`] if the flush fails.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush().map_err(|e| {
            DatasetIoError::SyncFailed {
                path: self.path.clone(),
                source: e,
            }
            .into()
        })
    }
}

/// A read-only view of a finished dataset file.
#[derive(Debug)]
pub struct DatasetView {
    mmap: Mmap,
    header: DatasetHeader,
    path: String,
}

impl DatasetView {
    /// Opens and validates a dataset file.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::ReadFailed`] if the file cannot be opened or
    /// mapped, and [`DatasetIoError::CorruptedDataset`] if the header is
    /// invalid or the file is shorter than its extent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        let file = File::open(path).map_err(|e| DatasetIoError::ReadFailed {
            path: path_str.clone(),
            source: e,
        })?;

        // SAFETY: the view is read-only; finished datasets are not modified
        // by the recorder after close.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| DatasetIoError::ReadFailed {
                path: path_str.clone(),
                source: e,
            })?
        };

        let header = DatasetHeader::decode(&mmap, &path_str)?;
        let expected = header.file_len(header.extent);
        if expected.is_none_or(|len| len > mmap.len() as u64) {
            return Err(DatasetIoError::CorruptedDataset {
                path: path_str,
                reason: format!(
                    "file holds {} bytes, extent {} needs {expected:?}",
                    mmap.len(),
                    header.extent
                ),
            }
            .into());
        }

        Ok(Self {
            mmap,
            header,
            path: path_str,
        })
    }

    /// Number of records in the dataset.
    pub fn extent(&self) -> u64 {
        self.header.extent
    }

    /// Record size in bytes.
    pub fn record_size(&self) -> usize {
        self.header.record_size as usize
    }

    /// Growth increment the dataset was written with.
    pub fn chunk_size(&self) -> u64 {
        self.header.chunk_size
    }

    /// Path to the dataset file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw bytes of record `index`.
    pub fn record(&self, index: u64) -> Option<&[u8]> {
        if index >= self.header.extent {
            return None;
        }
        let start = HEADER_SIZE + usize::try_from(index).ok()? * self.record_size();
        self.mmap.get(start..start + self.record_size())
    }

    /// Gathers one field of every record into a contiguous buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::BoundsViolation`] if the field does not fit
    /// the record.
    pub fn read_field(&self, field: &Field) -> Result<Vec<u8>> {
        if field.offset + field.size > self.record_size() {
            return Err(DatasetIoError::BoundsViolation {
                start: 0,
                end: self.header.extent,
                extent: self.header.extent,
            }
            .into());
        }

        let mut out = Vec::with_capacity(self.records_len() * field.size);
        for record in self.records() {
            out.extend_from_slice(&record[field.offset..field.offset + field.size]);
        }
        Ok(out)
    }

    /// Gathers an f64 field of every record.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIoError::BoundsViolation`] if the field does not fit
    /// the record.
    pub fn read_f64_field(&self, field: &Field) -> Result<Vec<f64>> {
        Ok(crate::element::decode_slice(&self.read_field(field)?))
    }

    fn records_len(&self) -> usize {
        usize::try_from(self.header.extent).unwrap_or(usize::MAX)
    }

    fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.mmap[HEADER_SIZE..]
            .chunks_exact(self.record_size())
            .take(self.records_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use crate::error::SimDumpError;
    use crate::schema::{SchemaBuilder, StorageKind};
    use tempfile::tempdir;

    fn async_fields() -> (Field, Field, usize) {
        let layout = SchemaBuilder::new(16)
            .build(StorageKind::Async, &[2], ElementType::I32)
            .unwrap()
            .layout();
        (layout.time.unwrap(), layout.payload, layout.record_size)
    }

    #[test]
    fn test_create_writes_header() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sig.sds");

        let dataset = Dataset::create(&path, 16, 8, 8).unwrap();
        assert_eq!(dataset.extent(), 8);
        assert_eq!(dataset.record_size(), 16);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64 + 8 * 16);

        // A second create on the same path must not clobber the file.
        assert!(Dataset::create(&path, 16, 8, 8).is_err());
    }

    #[test]
    fn test_field_writes_interleave() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sig.sds");
        let (time, data, record_size) = async_fields();

        let mut dataset = Dataset::create(&path, record_size, 4, 4).unwrap();
        dataset.write_f64_field(&time, 1, &[0.5, 1.5]).unwrap();
        let mut payload = Vec::new();
        for v in [10i32, 11, 20, 21] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        dataset.write_field(&data, 1, &payload).unwrap();
        dataset.flush().unwrap();
        drop(dataset);

        let view = DatasetView::open(&path).unwrap();
        assert_eq!(view.extent(), 4);
        assert_eq!(view.read_f64_field(&time).unwrap(), vec![0.0, 0.5, 1.5, 0.0]);
        let values: Vec<i32> = crate::element::decode_slice(&view.read_field(&data).unwrap());
        assert_eq!(values, vec![0, 0, 10, 11, 20, 21, 0, 0]);
    }

    #[test]
    fn test_grow_and_shrink() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sig.sds");
        let (time, _, record_size) = async_fields();

        let mut dataset = Dataset::create(&path, record_size, 4, 4).unwrap();
        dataset.write_f64_field(&time, 0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        dataset.set_extent(8).unwrap();
        dataset.write_f64_field(&time, 4, &[5.0]).unwrap();
        dataset.set_extent(5).unwrap();
        dataset.flush().unwrap();
        drop(dataset);

        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            (64 + 5 * record_size) as u64
        );
        let view = DatasetView::open(&path).unwrap();
        assert_eq!(view.read_f64_field(&time).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(view.chunk_size(), 4);
        assert!(view.record(5).is_none());
    }

    #[test]
    fn test_write_beyond_extent_rejected() {
        let temp_dir = tempdir().unwrap();
        let (time, _, record_size) = async_fields();
        let mut dataset =
            Dataset::create(temp_dir.path().join("sig.sds"), record_size, 4, 4).unwrap();

        match dataset.write_f64_field(&time, 3, &[1.0, 2.0]) {
            Err(SimDumpError::DatasetIo(DatasetIoError::BoundsViolation {
                start: 3,
                end: 5,
                extent: 4,
            })) => {}
            other => panic!("Expected BoundsViolation, got: {other:?}"),
        }
    }

    #[test]
    fn test_corrupted_header_detected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.sds");
        std::fs::write(&path, [0u8; 80]).unwrap();

        match DatasetView::open(&path) {
            Err(SimDumpError::DatasetIo(DatasetIoError::CorruptedDataset { reason, .. })) => {
                assert!(reason.contains("magic"));
            }
            other => panic!("Expected CorruptedDataset, got: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_file_detected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("short.sds");
        let header = DatasetHeader {
            record_size: 8,
            chunk_size: 4,
            extent: 10,
        };
        std::fs::write(&path, header.encode()).unwrap();

        assert!(matches!(
            DatasetView::open(&path),
            Err(SimDumpError::DatasetIo(DatasetIoError::CorruptedDataset { .. }))
        ));
    }
}
