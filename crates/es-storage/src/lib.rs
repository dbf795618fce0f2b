//! es-storage: object storage boundary.
//!
//! The batch only needs list/get/put against a bucket. Listing is paginated
//! by continuation token; [`ObjectStore::list_all`] follows tokens until the
//! listing is exhausted.

pub mod fs;
pub mod memory;
pub mod store;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use store::{ListPage, ObjectMeta, ObjectStore};

use std::path::PathBuf;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid object key: {key}")]
    InvalidKey { key: String },

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage backend error: {message}")]
    Backend { message: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
