//! Error types for setup, per-record processing and storage.

use std::path::PathBuf;
use thiserror::Error;

/// Exit status when the configuration cannot be read.
pub const EXIT_CONFIG_UNREADABLE: u8 = 1;
/// Exit status when a prior store file cannot be removed.
pub const EXIT_STORE_RESET: u8 = 2;
/// Exit status when the store schema cannot be created.
pub const EXIT_SCHEMA_INIT: u8 = 3;
/// Exit status when the NATS server cannot be reached.
pub const EXIT_STREAM_UNREACHABLE: u8 = 11;
/// Exit status when the inbound subject or stream is unavailable.
pub const EXIT_TOPIC_UNAVAILABLE: u8 = 13;

/// Fatal failures before the ingestion loop starts.
///
/// Each variant maps to a distinct process exit status so a supervisor can
/// tell the failure class apart without reading logs.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration unreadable: {0}")]
    Config(String),

    #[error("cannot remove prior store file {path}")]
    StoreReset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot initialize store schema")]
    SchemaInit(#[source] StoreError),

    #[error("cannot reach NATS at {url}: {reason}")]
    StreamUnreachable { url: String, reason: String },

    #[error("inbound subject {subject} unavailable: {reason}")]
    TopicUnavailable { subject: String, reason: String },
}

impl SetupError {
    pub fn exit_code(&self) -> u8 {
        match self {
            SetupError::Config(_) => EXIT_CONFIG_UNREADABLE,
            SetupError::StoreReset { .. } => EXIT_STORE_RESET,
            SetupError::SchemaInit(_) => EXIT_SCHEMA_INIT,
            SetupError::StreamUnreachable { .. } => EXIT_STREAM_UNREACHABLE,
            SetupError::TopicUnavailable { .. } => EXIT_TOPIC_UNAVAILABLE,
        }
    }
}

/// A payload that could not be turned into a record at all.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Failures of the aggregate store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot prepare store directory {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A single record that was skipped by the ingestion loop.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Pipeline stage the record failed in.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Decode(_) => "decode",
            IngestError::Store(_) => "store",
        }
    }
}
