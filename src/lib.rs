//! # DeviceDb - Device catalog storage and sync
//!
//! A manufacturer/device catalog backed by SQLite.
//!
//! DeviceDb provides:
//! - A URI-addressed store over the `device` and `manufacturer` tables plus a
//!   derived device-manufacturer join
//! - Versioned schema migrations applied from plain SQL scripts
//! - Transactional batch writes with back-references between operations
//! - Change notification for observers of the affected collections
//! - A reconciler that atomically replaces local data with a remote snapshot

pub mod api;
pub mod config;
pub mod contract;
pub mod model;
pub mod storage;
pub mod sync;
pub mod ui;
pub mod uri;

// Re-exports for convenient access
pub use model::{Device, DeviceManufacturer, Manufacturer};
pub use storage::{BatchOp, DeviceStore, Filter, OpResult, RowValues};
pub use uri::{Collection, ResourceUri};

/// Result type alias for DeviceDb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for DeviceDb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    #[error("Transaction aborted: {0}")]
    Transaction(#[source] Box<Error>),

    #[error("Schema migration to version {version} failed: {source}")]
    SchemaMigration {
        version: i32,
        #[source]
        source: Box<Error>,
    },

    #[error("Remote fetch failed: {0}")]
    RemoteFetch(#[from] reqwest::Error),

    #[error("Sync task failed: {0}")]
    SyncTask(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a failure that aborted a transaction, without double-wrapping.
    pub(crate) fn into_transaction(self) -> Error {
        match self {
            already @ Error::Transaction(_) => already,
            other => Error::Transaction(Box::new(other)),
        }
    }
}
