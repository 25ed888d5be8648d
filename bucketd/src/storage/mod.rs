//! Object store client layer.
//!
//! This module defines the capability the gateway depends on: an
//! [`ObjectStore`] that can list, put, and get objects in one named bucket.
//! The bucket is fixed when the backend is constructed; the gateway never
//! chooses buckets per request.
//!
//! Two backends are provided:
//!
//! - [`S3ObjectStore`]: any S3-compatible endpoint (AWS S3, MinIO, Ceph RGW)
//!   via the AWS SDK.
//! - [`MemoryObjectStore`]: a process-local map, used by tests and for
//!   development without a running backend.
//!
//! [`create_object_store`] builds the configured backend at startup; the
//! result is injected into the gateway as an `Arc<dyn ObjectStore>`, so
//! backend lifecycle is owned by process startup rather than a module-level
//! singleton.

pub mod errors;
pub mod memory;
pub mod s3;

pub use errors::{Result, StorageError};
pub use memory::{FailingObjectStore, MemoryObjectStore};
pub use s3::S3ObjectStore;

use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::info;

/// Inbound payload bytes, as produced by the HTTP layer. Chunk errors mean
/// the client-side transfer failed (disconnect, malformed framing).
pub type PayloadStream = BoxStream<'static, std::result::Result<Bytes, anyhow::Error>>;

/// Outbound object bytes, as produced by a backend.
pub type DownloadStream = BoxStream<'static, std::result::Result<Bytes, StorageError>>;

/// A single-chunk payload stream. Convenient for callers that already hold
/// the full payload in memory (tests, small administrative writes).
pub fn payload_from_bytes(bytes: impl Into<Bytes>) -> PayloadStream {
    futures::stream::iter([Ok::<_, anyhow::Error>(bytes.into())]).boxed()
}

/// A stored object as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key within the bucket
    pub path: String,
    /// Size in bytes, as written
    pub size: u64,
}

/// Optional user metadata attached to an object at upload time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// An open download: a byte stream positioned at the start of the object,
/// plus the length when the backend reports one ahead of transfer.
pub struct ObjectDownload {
    pub stream: DownloadStream,
    pub size: Option<u64>,
}

/// Capability contract for an S3-compatible object store, scoped to one
/// bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects under `prefix`. Backend pagination is handled here; the
    /// returned vector is complete. Enumeration order is whatever the
    /// backend returns. With `recursive` false, only objects directly under
    /// the prefix are returned (no descent into deeper virtual directories).
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectEntry>>;

    /// Stream `payload` into the object at `path`, overwriting any existing
    /// object (last-writer-wins). When `declared_len` is known and the
    /// stream ends short, the write is aborted and
    /// [`StorageError::PartialWrite`] is returned; no partial object remains
    /// visible.
    async fn put(
        &self,
        path: &str,
        payload: PayloadStream,
        declared_len: Option<u64>,
        metadata: ObjectMetadata,
    ) -> Result<ObjectEntry>;

    /// Open the object at `path` for reading. Fails with
    /// [`StorageError::NotFound`] when absent — never an empty stream.
    async fn get(&self, path: &str) -> Result<ObjectDownload>;
}

/// Create an object store backend based on configuration.
pub async fn create_object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::S3(s3_config) => {
            info!(bucket = %s3_config.bucket, "creating S3 object store backend");
            let store = S3ObjectStore::connect(s3_config).await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Memory(memory_config) => {
            info!(bucket = %memory_config.bucket, "creating in-memory object store backend");
            Ok(Arc::new(MemoryObjectStore::new(&memory_config.bucket)))
        }
    }
}
