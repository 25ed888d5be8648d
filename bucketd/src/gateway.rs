//! The gateway service: three operations over the object store capability.
//!
//! [`Gateway`] is the only stateful-looking piece of the service and it is
//! deliberately stateless: it holds an injected [`ObjectStore`] handle and
//! the public base URL, nothing else. Every call is an independent
//! request/response exchange; concurrency control and pooling live in the
//! backend client.
//!
//! Retrieval locators are static links (`{public_url}/objects/{path}`,
//! percent-encoded per segment) rather than signed URLs, so list responses
//! stay deterministic and the backend stays hidden behind the gateway.

use crate::storage::{ObjectDownload, ObjectMetadata, ObjectStore, PayloadStream, Result, StorageError};
use crate::types::ObjectPath;
use anyhow::anyhow;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use url::Url;

/// A stored object as the gateway reports it: the backend entry plus the
/// retrieval locator and any metadata known at this point.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub path: String,
    pub size: u64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Url,
}

pub struct Gateway {
    store: Arc<dyn ObjectStore>,
    public_url: Url,
}

impl Gateway {
    pub fn new(store: Arc<dyn ObjectStore>, public_url: Url) -> Self {
        Self { store, public_url }
    }

    /// Compute the static retrieval locator for an object path.
    fn locator(&self, path: &str) -> Url {
        let mut url = self.public_url.clone();
        // Infallible for the validated base URL, and a no-op otherwise.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("objects");
            segments.extend(path.split('/'));
        }
        url
    }

    /// List objects under a prefix.
    ///
    /// Backend pagination is fully materialized before returning; order is
    /// whatever the backend produced. An unreachable or denying backend
    /// surfaces as an error — an empty vector always means an empty listing.
    /// Titles and descriptions are not populated here: bucket listings
    /// carry only keys and sizes.
    pub async fn list_objects(&self, prefix: Option<&str>, recursive: bool) -> Result<Vec<ObjectRecord>> {
        let prefix = prefix.unwrap_or("");
        let entries = self.store.list(prefix, recursive).await?;
        debug!(prefix, recursive, count = entries.len(), "listed objects");

        Ok(entries
            .into_iter()
            .map(|entry| {
                let url = self.locator(&entry.path);
                ObjectRecord {
                    path: entry.path,
                    size: entry.size,
                    title: None,
                    description: None,
                    url,
                }
            })
            .collect())
    }

    /// Stream a payload into the object at `path`, overwriting any existing
    /// object (last-writer-wins).
    ///
    /// The returned record carries the size actually written: bytes are
    /// counted as they flow through and cross-checked against what the
    /// backend reports, so the size is never just echoed from the request.
    /// A payload that ends short of `declared_len` fails with
    /// [`StorageError::PartialWrite`] and leaves no object behind.
    pub async fn put_object(
        &self,
        path: &ObjectPath,
        payload: PayloadStream,
        declared_len: Option<u64>,
        metadata: ObjectMetadata,
    ) -> Result<ObjectRecord> {
        let counter = Arc::new(AtomicU64::new(0));
        let tally = counter.clone();
        let counted = payload
            .inspect_ok(move |chunk| {
                tally.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            })
            .boxed();

        let entry = self
            .store
            .put(path.as_str(), counted, declared_len, metadata.clone())
            .await?;

        let written = counter.load(Ordering::Relaxed);
        if entry.size != written {
            return Err(StorageError::Other(anyhow!(
                "backend reported {} stored bytes but {} were streamed",
                entry.size,
                written
            )));
        }

        debug!(path = %path, size = entry.size, "stored object");

        Ok(ObjectRecord {
            url: self.locator(&entry.path),
            path: entry.path,
            size: entry.size,
            title: metadata.title,
            description: metadata.description,
        })
    }

    /// Open the object at `path` for reading.
    ///
    /// The download's stream is positioned at the object start and its size
    /// is reported when known ahead of transfer. A missing object is a
    /// [`StorageError::NotFound`], never an empty stream.
    pub async fn get_object(&self, path: &ObjectPath) -> Result<ObjectDownload> {
        self.store.get(path.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FailingObjectStore, MemoryObjectStore, payload_from_bytes};
    use bytes::Bytes;

    fn gateway_with(store: Arc<dyn ObjectStore>) -> Gateway {
        Gateway::new(store, "http://localhost:8080".parse().unwrap())
    }

    fn memory_gateway() -> Gateway {
        gateway_with(Arc::new(MemoryObjectStore::new("test-bucket")))
    }

    fn path(raw: &str) -> ObjectPath {
        raw.parse().unwrap()
    }

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
    async fn test_upload_download_round_trip() {
        let gateway = memory_gateway();
        let payload = b"round trip payload".to_vec();

        let record = gateway
            .put_object(
                &path("docs/note.txt"),
                payload_from_bytes(payload.clone()),
                Some(payload.len() as u64),
                ObjectMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(record.path, "docs/note.txt");
        assert_eq!(record.size, payload.len() as u64);
        assert_eq!(record.url.as_str(), "http://localhost:8080/objects/docs/note.txt");

        let download = gateway.get_object(&path("docs/note.txt")).await.unwrap();
        assert_eq!(download.size, Some(payload.len() as u64));
        assert_eq!(collect(download).await, payload);
    }

    #[tokio::test]
    async fn test_multi_chunk_payload_is_counted_across_chunks() {
        let gateway = memory_gateway();
        let chunks = vec![
            Ok::<_, anyhow::Error>(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let payload = futures::stream::iter(chunks).boxed();

        let record = gateway
            .put_object(&path("greeting"), payload, Some(11), ObjectMetadata::default())
            .await
            .unwrap();
        assert_eq!(record.size, 11);

        let download = gateway.get_object(&path("greeting")).await.unwrap();
        assert_eq!(collect(download).await, b"hello world");
    }

    #[tokio::test]
    async fn test_list_returns_exactly_the_uploads_under_prefix() {
        let gateway = memory_gateway();
        for name in ["imgs/a.jpg", "imgs/b.jpg", "imgs/c.jpg", "other/d.jpg"] {
            gateway
                .put_object(&path(name), payload_from_bytes("x"), None, ObjectMetadata::default())
                .await
                .unwrap();
        }

        let records = gateway.list_objects(Some("imgs/"), true).await.unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            assert!(record.path.starts_with("imgs/"));
            assert_eq!(
                record.url.as_str(),
                format!("http://localhost:8080/objects/{}", record.path)
            );
        }
    }

    #[tokio::test]
    async fn test_list_empty_bucket_is_empty_not_error() {
        let gateway = memory_gateway();
        let records = gateway.list_objects(None, true).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_list_unreachable_backend_is_unavailable_not_empty() {
        let gateway = gateway_with(Arc::new(FailingObjectStore));
        let result = gateway.list_objects(None, true).await;
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_get_missing_object_is_not_found() {
        let gateway = memory_gateway();
        let result = gateway.get_object(&path("never/uploaded")).await;
        assert!(matches!(result, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_zero_length_upload_round_trips() {
        let gateway = memory_gateway();

        let record = gateway
            .put_object(
                &path("empty.bin"),
                payload_from_bytes(Bytes::new()),
                Some(0),
                ObjectMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(record.size, 0);

        let download = gateway.get_object(&path("empty.bin")).await.unwrap();
        assert_eq!(download.size, Some(0));
        assert!(collect(download).await.is_empty());
    }

    #[tokio::test]
    async fn test_short_payload_fails_and_stores_nothing() {
        let gateway = memory_gateway();

        let result = gateway
            .put_object(
                &path("truncated"),
                payload_from_bytes("abc"),
                Some(1000),
                ObjectMetadata::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(StorageError::PartialWrite {
                expected: 1000,
                written: 3
            })
        ));
        assert!(matches!(
            gateway.get_object(&path("truncated")).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_locator_percent_encodes_segments() {
        let gateway = memory_gateway();
        gateway
            .put_object(
                &path("my folder/img 1.jpg"),
                payload_from_bytes("x"),
                None,
                ObjectMetadata::default(),
            )
            .await
            .unwrap();

        let records = gateway.list_objects(Some("my folder/"), true).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].url.as_str(),
            "http://localhost:8080/objects/my%20folder/img%201.jpg"
        );
    }

    #[tokio::test]
    async fn test_metadata_is_echoed_on_upload() {
        let gateway = memory_gateway();
        let metadata = ObjectMetadata {
            title: Some("Holiday photo".to_string()),
            description: Some("Taken at the coast".to_string()),
        };

        let record = gateway
            .put_object(&path("pics/coast.jpg"), payload_from_bytes("x"), None, metadata)
            .await
            .unwrap();
        assert_eq!(record.title.as_deref(), Some("Holiday photo"));
        assert_eq!(record.description.as_deref(), Some("Taken at the coast"));
    }
}
