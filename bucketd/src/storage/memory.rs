//! In-memory backend for the [`ObjectStore`] capability.
//!
//! Backs tests and development runs without a real S3 endpoint. Semantics
//! match the S3 backend: flat keys, overwrite on put, distinguishable
//! NotFound, partial-write rejection.

use crate::storage::errors::{Result, StorageError};
use crate::storage::{ObjectDownload, ObjectEntry, ObjectMetadata, ObjectStore, PayloadStream};
use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;

struct StoredObject {
    data: Bytes,
    #[allow(dead_code)] // kept for parity with the S3 backend's user metadata
    metadata: ObjectMetadata,
}

pub struct MemoryObjectStore {
    bucket: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectEntry>> {
        let entries = self
            .objects
            .iter()
            .filter_map(|entry| {
                let key = entry.key();
                if !key.starts_with(prefix) {
                    return None;
                }
                if !recursive && key[prefix.len()..].contains('/') {
                    return None;
                }
                Some(ObjectEntry {
                    path: key.clone(),
                    size: entry.value().data.len() as u64,
                })
            })
            .collect();
        Ok(entries)
    }

    async fn put(
        &self,
        path: &str,
        mut payload: PayloadStream,
        declared_len: Option<u64>,
        metadata: ObjectMetadata,
    ) -> Result<ObjectEntry> {
        let mut data = Vec::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|err| StorageError::Other(err.context("payload stream failed")))?;
            data.extend_from_slice(&chunk);
        }

        let written = data.len() as u64;
        if let Some(expected) = declared_len {
            if written < expected {
                // Short stream: reject before anything becomes visible.
                return Err(StorageError::PartialWrite { expected, written });
            }
            if written > expected {
                return Err(StorageError::Other(anyhow!(
                    "payload exceeded declared length: received {written} bytes, declared {expected}"
                )));
            }
        }

        self.objects.insert(
            path.to_string(),
            StoredObject {
                data: Bytes::from(data),
                metadata,
            },
        );

        Ok(ObjectEntry {
            path: path.to_string(),
            size: written,
        })
    }

    async fn get(&self, path: &str) -> Result<ObjectDownload> {
        let data = self
            .objects
            .get(path)
            .map(|stored| stored.data.clone())
            .ok_or(StorageError::NotFound)?;
        let size = data.len() as u64;
        Ok(ObjectDownload {
            stream: futures::stream::iter([Ok::<_, StorageError>(data)]).boxed(),
            size: Some(size),
        })
    }
}

/// Backend double whose every operation fails with
/// [`StorageError::Unavailable`]. Lets tests assert that backend outages
/// surface as errors instead of empty results.
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn list(&self, _prefix: &str, _recursive: bool) -> Result<Vec<ObjectEntry>> {
        Err(StorageError::Unavailable {
            message: "backend is unreachable".to_string(),
        })
    }

    async fn put(
        &self,
        _path: &str,
        _payload: PayloadStream,
        _declared_len: Option<u64>,
        _metadata: ObjectMetadata,
    ) -> Result<ObjectEntry> {
        Err(StorageError::Unavailable {
            message: "backend is unreachable".to_string(),
        })
    }

    async fn get(&self, _path: &str) -> Result<ObjectDownload> {
        Err(StorageError::Unavailable {
            message: "backend is unreachable".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::payload_from_bytes;
    use futures::TryStreamExt;

    async fn collect(download: ObjectDownload) -> Vec<u8> {
        download
            .stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_storage_lifecycle() {
        let store = MemoryObjectStore::new("test-bucket");
        let content = b"test content for storage";

        let entry = store
            .put(
                "docs/readme.txt",
                payload_from_bytes(content.as_slice()),
                Some(content.len() as u64),
                ObjectMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(entry.path, "docs/readme.txt");
        assert_eq!(entry.size, content.len() as u64);

        let download = store.get("docs/readme.txt").await.unwrap();
        assert_eq!(download.size, Some(content.len() as u64));
        assert_eq!(collect(download).await, content);
    }

    #[tokio::test]
    async fn test_overwrite_is_last_writer_wins() {
        let store = MemoryObjectStore::new("test-bucket");

        store
            .put("k", payload_from_bytes("first"), None, ObjectMetadata::default())
            .await
            .unwrap();
        store
            .put("k", payload_from_bytes("second"), None, ObjectMetadata::default())
            .await
            .unwrap();

        let download = store.get("k").await.unwrap();
        assert_eq!(collect(download).await, b"second");
    }

    #[tokio::test]
    async fn test_get_nonexistent_is_not_found() {
        let store = MemoryObjectStore::new("test-bucket");
        let result = store.get("nonexistent/file.dat").await;
        assert!(matches!(result, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_short_payload_is_partial_write() {
        let store = MemoryObjectStore::new("test-bucket");

        let result = store
            .put("k", payload_from_bytes("abc"), Some(10), ObjectMetadata::default())
            .await;
        assert!(matches!(
            result,
            Err(StorageError::PartialWrite { expected: 10, written: 3 })
        ));

        // The failed write must not leave an object behind.
        assert!(matches!(store.get("k").await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_prefix_and_recursion() {
        let store = MemoryObjectStore::new("test-bucket");
        for path in ["a/one", "a/two", "a/sub/three", "b/four"] {
            store
                .put(path, payload_from_bytes("x"), None, ObjectMetadata::default())
                .await
                .unwrap();
        }

        let all = store.list("", true).await.unwrap();
        assert_eq!(all.len(), 4);

        let under_a = store.list("a/", true).await.unwrap();
        assert_eq!(under_a.len(), 3);

        let mut shallow: Vec<String> = store
            .list("a/", false)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        shallow.sort();
        assert_eq!(shallow, vec!["a/one", "a/two"]);
    }

    #[tokio::test]
    async fn test_list_empty_bucket_is_empty_not_error() {
        let store = MemoryObjectStore::new("test-bucket");
        let entries = store.list("", true).await.unwrap();
        assert!(entries.is_empty());
    }
}
