//! # simdump
//!
//! Buffered, chunked recorder for hierarchical simulation signal dumps.
//!
//! simdump streams time-stamped signals from a simulation engine into a
//! self-describing on-disk container. The engine calls into it once per signal
//! per timestep; every signal stages its samples in a fixed-size cache and
//! writes them to its dataset one chunk at a time, so thousands of tiny
//! writes become a few large ones.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Three storage kinds: Sync (payload only), Async (f64 timestamp + payload)
//!   and SimTime (integer nanoseconds + fractional remainder)
//! - N-dimensional payloads of any primitive integer or float element type
//! - Dotted signal names (`u_top.u_sub.data`) map to nested groups
//! - Datasets grow one chunk at a time and shrink to the exact record count
//!   on close
//! - Single-threaded and synchronous: no background threads, no locking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simdump::{Container, DumpReader, ElementType, StorageKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut container = Container::open_default("./dump")?;
//!
//! // Create and register signals
//! let bus = container.add_signal("u_top.bus", StorageKind::Async, &[4], ElementType::U8)?;
//! let now = container.add_signal("sim_time", StorageKind::SimTime, &[], ElementType::I64)?;
//!
//! // Record (cached, flushed one chunk at a time)
//! for step in 0..100u8 {
//!     container.write_values(bus, f64::from(step) * 0.5, &[step, 0, 0, step])?;
//!     container.write_time(now, i64::from(step) * 1000, 0.0)?;
//! }
//!
//! // Flush everything and shrink datasets to size
//! container.close()?;
//!
//! // Read the dump back
//! let reader = DumpReader::open("./dump")?;
//! let data = reader.read("u_top.bus")?;
//! assert_eq!(data.records(), 100);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Container`] - Opens a dump directory, owns the signal registry
//! - [`SignalStore`] - Per-signal cache, flush and growth state
//! - [`SignalHandle`] - Opaque, `Copy` handle for writes through the container
//! - [`DumpReader`] - Reads a finished dump back
//!
//! ## Modules
//!
//! - [`container`] - Container lifecycle and registry
//! - [`signal`] - Buffered per-signal storage
//! - [`schema`] - Record schemas and layouts for the storage kinds
//! - [`hierarchy`] - Dotted names, groups and attributes
//! - [`cache`] - Staging buffers
//! - [`dataset`] - Extensible memory-mapped record files
//! - [`element`] - Payload element types
//! - [`reader`] - Reading finished dumps
//! - [`config`] - Container configuration
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod container;
pub mod dataset;
pub mod element;
pub mod error;
pub mod hierarchy;
pub mod reader;
pub mod schema;
pub mod signal;

// Re-export primary API types at crate root for convenience.
pub use config::ContainerConfig;
pub use container::{Container, ContainerSummary, SignalHandle};
pub use element::{Element, ElementType};
pub use error::{RegistrationError, Result, SimDumpError};
pub use reader::{DumpReader, SignalData, SignalInfo, SimTime};
pub use schema::{RecordSchema, SchemaBuilder, StorageKind};
pub use signal::{FlushStats, SignalStore, SignalSummary};
