//! Record schemas for the three storage kinds.
//!
//! Every signal persists a one-dimensional sequence of fixed-size records.
//! What a record contains depends on the [`StorageKind`]:
//!
//! ```text
//! Sync     [ data: element[dims] ]
//! Async    [ time: f64 | data: element[dims] ]
//! SimTime  [ ns: i64   | rem: f64 ]
//! ```
//!
//! A [`RecordSchema`] is built once per signal by a [`SchemaBuilder`], which
//! enforces the flattened size limit, and is immutable afterwards. The
//! concrete byte layout (field offsets and record size) is derived from it by
//! [`RecordSchema::layout`].

use serde::{Deserialize, Serialize};

use crate::element::ElementType;
use crate::error::{Result, SchemaError};

/// Size of the f64 timestamp / remainder column in bytes.
const TIME_FIELD_SIZE: usize = 8;

/// Size of the integer nanosecond field of a SimTime record in bytes.
const NS_FIELD_SIZE: usize = 8;

/// How a signal's samples are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One payload per simulation step, no timestamp.
    Sync,
    /// Payload plus an f64 timestamp per sample.
    Async,
    /// High-resolution simulation time: integer nanoseconds plus a
    /// fractional remainder in `[0, 1)`.
    #[serde(rename = "time")]
    SimTime,
}

impl StorageKind {
    /// Value of the `storage` attribute attached to every dataset.
    pub const fn attribute_value(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::SimTime => "time",
        }
    }
}

/// Shape and element type of an N-dimensional payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadShape {
    /// Element type of every array entry.
    pub element: ElementType,
    /// Per-dimension extents; empty for a scalar.
    pub dims: Vec<usize>,
}

impl PayloadShape {
    /// Number of elements in one payload (product of all dimensions).
    pub fn flat_size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Payload size in bytes.
    pub fn stride(&self) -> usize {
        self.flat_size() * self.element.size()
    }
}

/// Immutable description of one signal's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordSchema {
    /// Payload-only records.
    Sync {
        /// The payload array.
        payload: PayloadShape,
    },
    /// Timestamped records.
    Async {
        /// The payload array.
        payload: PayloadShape,
    },
    /// Fixed `{ns: i64, rem: f64}` records.
    #[serde(rename = "time")]
    SimTime,
}

impl RecordSchema {
    /// The storage kind of this schema.
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::Sync { .. } => StorageKind::Sync,
            Self::Async { .. } => StorageKind::Async,
            Self::SimTime => StorageKind::SimTime,
        }
    }

    /// The payload array, if the kind carries one.
    pub const fn payload(&self) -> Option<&PayloadShape> {
        match self {
            Self::Sync { payload } | Self::Async { payload } => Some(payload),
            Self::SimTime => None,
        }
    }

    /// Element type of the payload, `None` for SimTime.
    pub fn element(&self) -> Option<ElementType> {
        self.payload().map(|p| p.element)
    }

    /// Payload dimensions, empty for SimTime.
    pub fn dims(&self) -> &[usize] {
        self.payload().map_or(&[], |p| p.dims.as_slice())
    }

    /// Size in bytes of the payload portion of a record.
    ///
    /// For SimTime this is the integer nanosecond field only; the remainder
    /// travels in the f64 column like an Async timestamp.
    pub fn stride(&self) -> usize {
        match self {
            Self::Sync { payload } | Self::Async { payload } => payload.stride(),
            Self::SimTime => NS_FIELD_SIZE,
        }
    }

    /// Whether records carry an f64 column next to the payload.
    pub const fn has_time_column(&self) -> bool {
        !matches!(self, Self::Sync { .. })
    }

    /// Computes the on-disk record layout.
    pub fn layout(&self) -> RecordLayout {
        match self {
            Self::Sync { payload } => RecordLayout {
                record_size: payload.stride(),
                payload: Field::array("data", 0, payload),
                time: None,
            },
            Self::Async { payload } => RecordLayout {
                record_size: TIME_FIELD_SIZE + payload.stride(),
                payload: Field::array("data", TIME_FIELD_SIZE, payload),
                time: Some(Field::scalar("time", 0, ElementType::F64)),
            },
            Self::SimTime => RecordLayout {
                record_size: NS_FIELD_SIZE + TIME_FIELD_SIZE,
                payload: Field::scalar("ns", 0, ElementType::I64),
                time: Some(Field::scalar("rem", NS_FIELD_SIZE, ElementType::F64)),
            },
        }
    }
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name (`data`, `time`, `ns` or `rem`).
    pub name: String,
    /// Byte offset within the record.
    pub offset: usize,
    /// Size in bytes.
    pub size: usize,
    /// Element type of the field.
    pub element: ElementType,
    /// Array extents; empty for a scalar field.
    pub dims: Vec<usize>,
}

impl Field {
    fn scalar(name: &str, offset: usize, element: ElementType) -> Self {
        Self {
            name: name.to_string(),
            offset,
            size: element.size(),
            element,
            dims: Vec::new(),
        }
    }

    fn array(name: &str, offset: usize, payload: &PayloadShape) -> Self {
        Self {
            name: name.to_string(),
            offset,
            size: payload.stride(),
            element: payload.element,
            dims: payload.dims.clone(),
        }
    }
}

/// Byte layout of a record: the payload field and the optional f64 column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    /// Total record size in bytes.
    pub record_size: usize,
    /// The payload field (`data`, or `ns` for SimTime).
    pub payload: Field,
    /// The f64 column (`time`, or `rem` for SimTime), if present.
    pub time: Option<Field>,
}

impl RecordLayout {
    /// All fields ordered by offset.
    pub fn fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = std::iter::once(&self.payload).chain(self.time.as_ref()).collect();
        fields.sort_by_key(|f| f.offset);
        fields
    }
}

/// Builds [`RecordSchema`]s under a flattened size limit.
#[derive(Debug, Clone, Copy)]
pub struct SchemaBuilder {
    max_flat_size: usize,
}

impl SchemaBuilder {
    /// Creates a builder enforcing `max_flat_size` elements per payload.
    pub const fn new(max_flat_size: usize) -> Self {
        Self { max_flat_size }
    }

    /// Builds the schema for a signal.
    ///
    /// `dims` and `element` are ignored for [`StorageKind::SimTime`]. The
    /// rank (`dims.len()`) is unbounded; only the flattened size is capped.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ZeroExtent`] if a dimension is zero and
    /// [`SchemaError::FlatSizeExceeded`] if the product of the dimensions is
    /// above the limit.
    pub fn build(
        &self,
        kind: StorageKind,
        dims: &[usize],
        element: ElementType,
    ) -> Result<RecordSchema> {
        match kind {
            StorageKind::Sync => Ok(RecordSchema::Sync {
                payload: self.payload_shape(dims, element)?,
            }),
            StorageKind::Async => Ok(RecordSchema::Async {
                payload: self.payload_shape(dims, element)?,
            }),
            StorageKind::SimTime => Ok(RecordSchema::SimTime),
        }
    }

    /// Validates the payload dimensions shared by Sync and Async.
    fn payload_shape(&self, dims: &[usize], element: ElementType) -> Result<PayloadShape> {
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(SchemaError::ZeroExtent { axis }.into());
        }

        let flat_size = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .unwrap_or(usize::MAX);

        if flat_size > self.max_flat_size {
            return Err(SchemaError::FlatSizeExceeded {
                flat_size,
                max_flat_size: self.max_flat_size,
            }
            .into());
        }

        Ok(PayloadShape {
            element,
            dims: dims.to_vec(),
        })
    }
}
