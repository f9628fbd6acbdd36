//! # concord-memory — In-Memory Replicas for concord
//!
//! Connectors and a reporter bundle that let `concord-protocol` trees run
//! against JSON documents held in memory, plus the `directory` protocol used
//! by the demo binary.
//!
//! ## Module Overview
//!
//! - [`replica`] — MemoryReplica (latency and offline simulation), ReplicaError
//! - [`connectors`] — RecordExists, RecordField, SettingValue, FieldSearch, IndexedField
//! - [`recorder`] — Recorder, ReportEvent and the recording reporters
//! - [`directory`] — DirectoryQuery, DirectoryAnswer, directory_protocol

pub mod connectors;
pub mod directory;
pub mod recorder;
pub mod replica;

pub use connectors::{FieldSearch, IndexedField, RECORD_KEY, RecordExists, RecordField, SettingValue};
pub use directory::{Directory, DirectoryAnswer, DirectoryQuery, SCHEMA_VERSION, directory_protocol};
pub use recorder::{RecordExistence, RecordPayload, RecordTerms, Recorder, ReportEvent};
pub use replica::{MemoryReplica, ReplicaError};
