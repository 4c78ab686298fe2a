//! postsaga adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `posts`: SQLite and in-memory relational stores
//! - `blobs`: Filesystem, Azure Blob Storage and in-memory object stores
//! - `metrics`: InfluxDB and in-memory activity logs

mod blob_azure;
mod blob_fs;
mod blob_memory;
mod influx;
mod metrics_memory;
mod posts_memory;
mod posts_sqlite;

/// Re-exports for relational store adapters
pub mod posts {
    pub use crate::posts_memory::InMemoryPostRepository;
    pub use crate::posts_sqlite::SqlitePostRepository;
}

/// Re-exports for object store adapters
pub mod blobs {
    pub use crate::blob_azure::AzureBlobStore;
    pub use crate::blob_fs::FsBlobStore;
    pub use crate::blob_memory::InMemoryBlobStore;
}

/// Re-exports for metrics store adapters
pub mod metrics {
    pub use crate::influx::{InfluxMetricsStore, InfluxSettings};
    pub use crate::metrics_memory::InMemoryMetricsStore;
}
