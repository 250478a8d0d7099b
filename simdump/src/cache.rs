//! Fixed-capacity staging buffers for signal records.
//!
//! A [`CacheBuffer`] batches up to `capacity` records in memory so that the
//! backing dataset sees one large field write per chunk instead of one tiny
//! write per sample. Payload bytes are packed back to back at `stride`
//! intervals; the optional f64 column (Async timestamps, SimTime remainders)
//! is kept in a parallel array.

use crate::error::{Result, SignalError};

/// Staging area for records that have not been flushed yet.
#[derive(Debug)]
pub struct CacheBuffer {
    /// Payload size of one record in bytes.
    stride: usize,
    /// Maximum number of staged records.
    capacity: usize,
    /// Number of staged records (the cache pointer).
    len: usize,
    /// Packed payloads, `capacity * stride` bytes.
    payload: Vec<u8>,
    /// Parallel f64 column, present when the schema has one.
    times: Option<Vec<f64>>,
}

impl CacheBuffer {
    /// Allocates a cache for `capacity` records of `stride` payload bytes.
    pub fn new(stride: usize, capacity: usize, with_times: bool) -> Self {
        Self {
            stride,
            capacity,
            len: 0,
            payload: vec![0; stride * capacity],
            times: with_times.then(|| vec![0.0; capacity]),
        }
    }

    /// Number of staged records.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is staged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` once `capacity` records are staged.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Payload size of one record in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Stages one record, copying exactly `stride` bytes of `payload`.
    ///
    /// `time` is stored only if the cache carries the f64 column.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::PayloadSize`] if `payload` is not exactly one
    /// stride long, and [`SignalError::BufferOverflow`] if the cache is full.
    /// Nothing is staged on error.
    pub fn append(&mut self, time: f64, payload: &[u8]) -> Result<()> {
        if payload.len() != self.stride {
            return Err(SignalError::PayloadSize {
                name: String::new(),
                expected: self.stride,
                actual: payload.len(),
            }
            .into());
        }
        self.append_with(time, |slot| slot.copy_from_slice(payload))
    }

    /// Stages one record whose payload is produced by `encode`.
    ///
    /// `encode` receives the record's `stride`-byte slot.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::BufferOverflow`] if the cache is full.
    pub fn append_with(&mut self, time: f64, encode: impl FnOnce(&mut [u8])) -> Result<()> {
        if self.is_full() {
            return Err(SignalError::BufferOverflow {
                capacity: self.capacity,
            }
            .into());
        }

        if let Some(times) = self.times.as_mut() {
            times[self.len] = time;
        }
        let offset = self.len * self.stride;
        encode(&mut self.payload[offset..offset + self.stride]);
        self.len += 1;
        Ok(())
    }

    /// Packed payloads of the staged records.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len * self.stride]
    }

    /// The f64 column of the staged records, if present.
    pub fn times(&self) -> Option<&[f64]> {
        self.times.as_deref().map(|t| &t[..self.len])
    }

    /// Drops all staged records. Capacity is retained.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimDumpError;

    #[test]
    fn test_append_packs_payloads() {
        let mut cache = CacheBuffer::new(2, 4, false);
        cache.append(9.0, &[1, 2]).unwrap();
        cache.append(9.0, &[3, 4]).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.payload(), &[1, 2, 3, 4]);
        assert!(cache.times().is_none());
        assert!(!cache.is_full());
    }

    #[test]
    fn test_times_column() {
        let mut cache = CacheBuffer::new(1, 3, true);
        cache.append(0.25, &[7]).unwrap();
        cache.append_with(0.5, |slot| slot[0] = 8).unwrap();

        assert_eq!(cache.times().unwrap(), &[0.25, 0.5]);
        assert_eq!(cache.payload(), &[7, 8]);
    }

    #[test]
    fn test_wrong_payload_size_leaves_cache_untouched() {
        let mut cache = CacheBuffer::new(4, 2, true);
        let result = cache.append(1.0, &[0; 3]);

        assert!(matches!(
            result,
            Err(SimDumpError::Signal(SignalError::PayloadSize {
                expected: 4,
                actual: 3,
                ..
            }))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overflow_and_clear() {
        let mut cache = CacheBuffer::new(1, 2, false);
        cache.append(0.0, &[1]).unwrap();
        cache.append(0.0, &[2]).unwrap();
        assert!(cache.is_full());

        assert!(matches!(
            cache.append(0.0, &[3]),
            Err(SimDumpError::Signal(SignalError::BufferOverflow { capacity: 2 }))
        ));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.payload().is_empty());
        cache.append(0.0, &[4]).unwrap();
        assert_eq!(cache.payload(), &[4]);
    }
}
