//! S3-compatible backend for the [`ObjectStore`] capability.
//!
//! Works against AWS S3 or any S3-compatible server (MinIO, Ceph RGW) by
//! overriding `endpoint_url` and enabling force-path-style addressing.
//! Credentials come from the standard AWS provider chain unless a static
//! key pair is configured.

use crate::config::S3StorageConfig;
use crate::storage::errors::{self, Result, StorageError};
use crate::storage::{ObjectDownload, ObjectEntry, ObjectMetadata, ObjectStore, PayloadStream};
use anyhow::anyhow;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Payloads up to this size go through a single PutObject call; larger (or
/// unknown-length) payloads stream through a multipart upload so the whole
/// object never has to sit in memory. 5 MiB is the S3 minimum part size.
const PART_SIZE: usize = 5 * 1024 * 1024;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build an SDK client from configuration and bind it to the bucket.
    pub async fn connect(config: &S3StorageConfig) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.as_str());
        }
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "bucketd-config",
            ));
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        let client = Client::from_conf(s3_config);

        info!(
            bucket = %config.bucket,
            endpoint = config.endpoint_url.as_ref().map(|u| u.as_str()).unwrap_or("default"),
            "connected S3 object store"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }

    /// Upload the remaining payload as multipart parts, verify the declared
    /// length, then complete the upload. Any error propagates to the caller,
    /// which aborts the upload so no partial object becomes visible.
    async fn stream_parts(
        &self,
        path: &str,
        upload_id: &str,
        head: Vec<u8>,
        mut payload: PayloadStream,
        declared_len: Option<u64>,
    ) -> Result<ObjectEntry> {
        let mut buffer = head;
        let mut total = buffer.len() as u64;
        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut ended = false;

        loop {
            while buffer.len() < PART_SIZE && !ended {
                match payload.next().await {
                    Some(Ok(chunk)) => {
                        total += chunk.len() as u64;
                        buffer.extend_from_slice(&chunk);
                    }
                    Some(Err(err)) => {
                        return Err(StorageError::Other(err.context("payload stream failed mid-transfer")));
                    }
                    None => ended = true,
                }
            }
            if buffer.is_empty() {
                break;
            }

            let part_data: Vec<u8> = if buffer.len() > PART_SIZE {
                buffer.drain(..PART_SIZE).collect()
            } else {
                std::mem::take(&mut buffer)
            };

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(path)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part_data))
                .send()
                .await
                .map_err(errors::from_sdk_error)?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag)
                    .part_number(part_number)
                    .build(),
            );
            debug!(path, part_number, total, "uploaded part");
            part_number += 1;
        }

        // Verify before completing: a short stream must abort, not complete.
        if let Some(expected) = declared_len {
            if total < expected {
                return Err(StorageError::PartialWrite { expected, written: total });
            }
            if total > expected {
                return Err(StorageError::Other(anyhow!(
                    "payload exceeded declared length: received {total} bytes, declared {expected}"
                )));
            }
        }

        let completed = CompletedMultipartUpload::builder().set_parts(Some(parts)).build();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(errors::from_sdk_error)?;

        Ok(ObjectEntry {
            path: path.to_string(),
            size: total,
        })
    }

    /// Best-effort abort of an in-flight multipart upload.
    async fn abort_upload(&self, path: &str, upload_id: &str) {
        if let Err(err) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(path, error = %err, "failed to abort multipart upload, orphaned parts may remain");
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if !recursive {
                req = req.delimiter("/");
            }
            if let Some(token) = continuation_token.take() {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(errors::from_sdk_error)?;

            for object in resp.contents.unwrap_or_default() {
                let Some(key) = object.key else { continue };
                entries.push(ObjectEntry {
                    path: key,
                    size: object.size.unwrap_or(0).max(0) as u64,
                });
            }

            continuation_token = resp.next_continuation_token;
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(entries)
    }

    async fn put(
        &self,
        path: &str,
        mut payload: PayloadStream,
        declared_len: Option<u64>,
        metadata: ObjectMetadata,
    ) -> Result<ObjectEntry> {
        // Buffer the head of the stream to decide between a single put and a
        // multipart upload without ever holding more than one part in memory.
        let mut head: Vec<u8> = Vec::new();
        let mut ended = false;
        while head.len() <= PART_SIZE {
            match payload.next().await {
                Some(Ok(chunk)) => head.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    return Err(StorageError::Other(
                        err.context("payload stream failed before reaching the backend"),
                    ));
                }
                None => {
                    ended = true;
                    break;
                }
            }
        }

        if ended {
            let written = head.len() as u64;
            // Nothing has touched the backend yet, so a short stream fails
            // cleanly with no object to clean up.
            if let Some(expected) = declared_len {
                if written < expected {
                    return Err(StorageError::PartialWrite { expected, written });
                }
                if written > expected {
                    return Err(StorageError::Other(anyhow!(
                        "payload exceeded declared length: received {written} bytes, declared {expected}"
                    )));
                }
            }

            let mut req = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(path)
                .content_length(written as i64)
                .body(ByteStream::from(head));
            if let Some(title) = &metadata.title {
                req = req.metadata("title", title.as_str());
            }
            if let Some(description) = &metadata.description {
                req = req.metadata("description", description.as_str());
            }
            req.send().await.map_err(errors::from_sdk_error)?;

            return Ok(ObjectEntry {
                path: path.to_string(),
                size: written,
            });
        }

        let mut create = self.client.create_multipart_upload().bucket(&self.bucket).key(path);
        if let Some(title) = &metadata.title {
            create = create.metadata("title", title.as_str());
        }
        if let Some(description) = &metadata.description {
            create = create.metadata("description", description.as_str());
        }
        let upload = create.send().await.map_err(errors::from_sdk_error)?;
        let upload_id = upload
            .upload_id
            .ok_or_else(|| StorageError::Other(anyhow!("backend returned no multipart upload id")))?;

        match self.stream_parts(path, &upload_id, head, payload, declared_len).await {
            Ok(entry) => Ok(entry),
            Err(err) => {
                self.abort_upload(path, &upload_id).await;
                Err(err)
            }
        }
    }

    async fn get(&self, path: &str) -> Result<ObjectDownload> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(errors::from_sdk_error)?;

        let size = resp.content_length.and_then(|len| u64::try_from(len).ok());

        // The SDK body is pull-based; adapt it into the download stream so
        // the transport can forward chunks as they arrive.
        let stream = futures::stream::try_unfold(resp.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(err) => Err(StorageError::Unavailable {
                    message: err.to_string(),
                }),
            }
        })
        .boxed();

        Ok(ObjectDownload { stream, size })
    }
}
