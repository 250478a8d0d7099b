//! Error types for the simdump signal recorder.

use thiserror::Error;

use crate::element::ElementType;
use crate::schema::StorageKind;
use crate::signal::SignalStore;

/// The main error type for all simdump operations.
///
/// Each variant wraps the error enum of the layer that failed, so callers can
/// match on the broad category first and on the specific condition second.
#[derive(Error, Debug)]
pub enum SimDumpError {
    /// Error opening the container, resolving names, or managing the registry.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// Error on the signal write path.
    #[error("signal error: {0}")]
    Signal(#[from] SignalError),

    /// Error validating a record schema at signal creation.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Error reading or writing a backing dataset file.
    #[error("dataset I/O error: {0}")]
    DatasetIo(#[from] DatasetIoError),

    /// Error loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by the container and the group hierarchy.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// A directory of the dump could not be created or accessed.
    #[error("failed to access '{path}': {source}")]
    DirectoryAccess {
        /// The path that could not be accessed.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The target path exists and is not a previous dump or an empty directory.
    #[error("path '{path}' exists and is not a simdump container")]
    PathOccupied {
        /// The rejected path.
        path: String,
    },

    /// The signal registry already holds the configured maximum.
    #[error("maximum number of signals has been reached: {max_signals}")]
    RegistryFull {
        /// The configured registry maximum.
        max_signals: usize,
    },

    /// The handle does not refer to a store registered with this container.
    #[error("invalid signal handle: {index}")]
    InvalidHandle {
        /// The registry index carried by the handle.
        index: usize,
    },

    /// A dotted signal or group name could not be resolved.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A signal with this name already exists in the container.
    #[error("signal '{name}' already exists")]
    SignalExists {
        /// The duplicate signal name.
        name: String,
    },

    /// No signal with this name exists in the dump.
    #[error("unknown signal '{name}'")]
    UnknownSignal {
        /// The requested signal name.
        name: String,
    },

    /// Failed to serialize or parse a JSON metadata file.
    #[error("failed to (de)serialize metadata: {0}")]
    MetadataSerialize(#[from] serde_json::Error),

    /// A metadata file is present but its content is unusable.
    #[error("corrupted metadata '{path}': {reason}")]
    CorruptedMetadata {
        /// The metadata file path.
        path: String,
        /// Description of what was invalid.
        reason: String,
    },
}

/// Errors raised on the signal write path.
#[derive(Error, Debug)]
pub enum SignalError {
    /// The operation does not apply to the signal's storage kind.
    #[error("'{operation}' is not valid for {kind:?} signal '{name}'")]
    KindMismatch {
        /// The signal name.
        name: String,
        /// The storage kind of the signal.
        kind: StorageKind,
        /// The rejected operation.
        operation: &'static str,
    },

    /// The payload does not have exactly one record's worth of data.
    #[error("payload for '{name}' has {actual} bytes, expected {expected}")]
    PayloadSize {
        /// The signal name.
        name: String,
        /// The record stride in bytes.
        expected: usize,
        /// The provided payload length in bytes.
        actual: usize,
    },

    /// A typed write used a different element type than the signal stores.
    #[error("signal '{name}' stores {expected:?} elements, got {actual:?}")]
    ElementMismatch {
        /// The signal name.
        name: String,
        /// The element type of the signal.
        expected: Option<ElementType>,
        /// The element type of the written values.
        actual: ElementType,
    },

    /// The staging cache is full and cannot accept another record.
    #[error("cache buffer is full ({capacity} records)")]
    BufferOverflow {
        /// The cache capacity in records.
        capacity: usize,
    },
}

/// Errors raised when validating a record schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The flattened payload size exceeds the configured limit.
    #[error("flattened record size {flat_size} exceeds maximum {max_flat_size}")]
    FlatSizeExceeded {
        /// The product of all dimensions, saturated on overflow.
        flat_size: usize,
        /// The configured limit.
        max_flat_size: usize,
    },

    /// A payload dimension has zero extent.
    #[error("dimension {axis} has zero extent")]
    ZeroExtent {
        /// Index of the zero-sized dimension.
        axis: usize,
    },
}

/// Errors raised by dataset file I/O.
#[derive(Error, Debug)]
pub enum DatasetIoError {
    /// Failed to open or read a dataset file.
    #[error("failed to read dataset '{path}': {source}")]
    ReadFailed {
        /// The dataset file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create, resize, or map a dataset file.
    #[error("failed to write dataset '{path}': {source}")]
    WriteFailed {
        /// The dataset file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to sync a dataset file to disk.
    #[error("failed to sync dataset '{path}' to disk: {source}")]
    SyncFailed {
        /// The dataset file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Dataset file is corrupted or has an invalid format.
    #[error("dataset '{path}' is corrupted: {reason}")]
    CorruptedDataset {
        /// The dataset file path.
        path: String,
        /// Description of the corruption.
        reason: String,
    },

    /// Attempted to access records beyond the dataset extent.
    #[error("access beyond dataset extent: records {start}..{end} > extent {extent}")]
    BoundsViolation {
        /// First record of the attempted access.
        start: u64,
        /// One past the last record of the attempted access.
        end: u64,
        /// The current dataset extent in records.
        extent: u64,
    },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`ContainerConfig`](crate::ContainerConfig).
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        /// The config file path.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A config value is out of range.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Description of the invalid value.
        reason: String,
    },
}

/// Returned by [`Container::register`](crate::Container::register) when the
/// registry is full.
///
/// The rejected store is handed back open and usable; converting this error
/// into [`SimDumpError`] drops the store, which closes it best-effort.
#[derive(Error, Debug)]
#[error("maximum number of signals has been reached: {max_signals}")]
pub struct RegistrationError {
    /// The store that was not registered.
    pub store: Box<SignalStore>,
    /// The configured registry maximum.
    pub max_signals: usize,
}

impl RegistrationError {
    /// Returns the rejected store.
    pub fn into_store(self) -> SignalStore {
        *self.store
    }
}

impl From<RegistrationError> for SimDumpError {
    fn from(err: RegistrationError) -> Self {
        ContainerError::RegistryFull {
            max_signals: err.max_signals,
        }
        .into()
    }
}

/// Type alias for `Result<T, SimDumpError>`.
pub type Result<T> = std::result::Result<T, SimDumpError>;
