use crate::AppState;
use crate::api::models::objects::{ListObjectsQuery, ObjectDescriptor};
use crate::errors::{Error, Result};
use crate::storage::{ObjectMetadata, StorageError};
use crate::types::{InvalidObjectPath, ObjectPath};
use anyhow::anyhow;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, Response, StatusCode, header},
};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tokio_stream::wrappers::ReceiverStream;

/// Header carrying an optional human-readable title for an uploaded object
const TITLE_HEADER: &str = "x-object-title";
/// Header carrying an optional description for an uploaded object
const DESCRIPTION_HEADER: &str = "x-object-description";

fn parse_path(raw: &str) -> Result<ObjectPath> {
    raw.parse().map_err(|err: InvalidObjectPath| Error::BadRequest {
        message: err.to_string(),
    })
}

fn header_string(headers: &HeaderMap, name: &str) -> Result<Option<String>> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map(str::to_string).map_err(|_| Error::BadRequest {
                message: format!("{name} header must be visible ASCII"),
            })
        })
        .transpose()
}

fn metadata_from_headers(headers: &HeaderMap) -> Result<ObjectMetadata> {
    Ok(ObjectMetadata {
        title: header_string(headers, TITLE_HEADER)?,
        description: header_string(headers, DESCRIPTION_HEADER)?,
    })
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

#[utoipa::path(
    get,
    path = "/objects",
    tag = "objects",
    summary = "List objects",
    description = "Returns every object under the given prefix. Enumeration order is whatever the \
                   storage backend produces; an empty array always means an empty listing, never a \
                   swallowed backend failure.",
    params(ListObjectsQuery),
    responses(
        (status = 200, description = "Objects under the prefix", body = Vec<ObjectDescriptor>),
        (status = 502, description = "Storage backend unreachable"),
        (status = 403, description = "Storage backend denied access")
    )
)]
pub async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<Vec<ObjectDescriptor>>> {
    let records = state
        .gateway
        .list_objects(query.prefix.as_deref(), query.recursive)
        .await?;
    Ok(Json(records.iter().map(ObjectDescriptor::from_record).collect()))
}

#[utoipa::path(
    put,
    path = "/objects/{path}",
    tag = "objects",
    summary = "Upload object",
    description = "Streams the request body into the object at `path`, overwriting any existing \
                   object (last-writer-wins). Optional `x-object-title` and `x-object-description` \
                   headers attach metadata. The returned size is the byte count actually stored.",
    params(("path" = String, Path, description = "Target object path, e.g. `myfolder/img.jpg`")),
    request_body(content_type = "application/octet-stream", description = "Raw object bytes"),
    responses(
        (status = 201, description = "Object stored", body = ObjectDescriptor),
        (status = 400, description = "Invalid path or truncated payload"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Storage backend unreachable")
    )
)]
pub async fn upload_object(
    State(state): State<AppState>,
    Path(raw_path): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<ObjectDescriptor>)> {
    let path = parse_path(&raw_path)?;
    let metadata = metadata_from_headers(&headers)?;
    let declared_len = declared_length(&headers);

    let payload = body.into_data_stream().map_err(anyhow::Error::from).boxed();
    let record = state.gateway.put_object(&path, payload, declared_len, metadata).await?;

    tracing::info!(path = %path, size = record.size, "object uploaded");

    Ok((StatusCode::CREATED, Json(ObjectDescriptor::from_record(&record))))
}

#[utoipa::path(
    post,
    path = "/objects",
    tag = "objects",
    summary = "Upload object (multipart form)",
    description = "Uploads the `file` part as an object. The target path is taken from a `path` \
                   field, falling back to the file part's original filename. Optional `title` and \
                   `description` fields attach metadata. Fields that follow the `file` part do not \
                   affect the stored object, since the payload is streamed to the backend as it \
                   arrives.",
    request_body(content_type = "multipart/form-data", description = "File upload with optional path and metadata"),
    responses(
        (status = 201, description = "Object stored", body = ObjectDescriptor),
        (status = 400, description = "Missing file part, invalid path, or malformed form data"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Storage backend unreachable")
    )
)]
pub async fn upload_object_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ObjectDescriptor>)> {
    let mut target_path: Option<String> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut stored: Option<ObjectDescriptor> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|err| Error::BadRequest {
        message: format!("Failed to parse multipart data: {err}"),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "path" => {
                target_path = Some(field.text().await.map_err(|err| Error::BadRequest {
                    message: format!("Failed to read path: {err}"),
                })?);
            }
            "title" => {
                title = Some(field.text().await.map_err(|err| Error::BadRequest {
                    message: format!("Failed to read title: {err}"),
                })?);
            }
            "description" => {
                description = Some(field.text().await.map_err(|err| Error::BadRequest {
                    message: format!("Failed to read description: {err}"),
                })?);
            }
            "file" => {
                if stored.is_some() {
                    return Err(Error::BadRequest {
                        message: "Only one 'file' part is allowed".to_string(),
                    });
                }

                let raw_path = target_path
                    .clone()
                    .or_else(|| field.file_name().map(str::to_string))
                    .ok_or_else(|| Error::BadRequest {
                        message: "No target path: provide a 'path' field before 'file', or a filename \
                                  on the file part"
                            .to_string(),
                    })?;
                let path = parse_path(&raw_path)?;
                let metadata = ObjectMetadata {
                    title: title.clone(),
                    description: description.clone(),
                };

                tracing::info!(path = %path, "starting multipart upload stream");

                // The field borrows the multipart reader, so it cannot be
                // handed to the gateway as a 'static stream directly. Pump
                // its chunks through a channel instead, and drive reader and
                // writer concurrently.
                let (tx, rx) = tokio::sync::mpsc::channel::<anyhow::Result<Bytes>>(8);
                let payload = ReceiverStream::new(rx).boxed();
                let put_fut = state.gateway.put_object(&path, payload, None, metadata);
                let feed_fut = async move {
                    loop {
                        match field.chunk().await {
                            Ok(Some(chunk)) => {
                                if tx.send(Ok(chunk)).await.is_err() {
                                    // Receiver dropped: the backend gave up first.
                                    break;
                                }
                            }
                            Ok(None) => break,
                            Err(err) => {
                                let reason = format!("Failed to read file chunk: {err}");
                                let _ = tx.send(Err(anyhow!(reason.clone()))).await;
                                return Err(Error::BadRequest { message: reason });
                            }
                        }
                    }
                    Ok(())
                };

                let (put_result, feed_result) = tokio::join!(put_fut, feed_fut);
                feed_result?;
                let record = put_result?;

                tracing::info!(path = %record.path, size = record.size, "object uploaded via form");
                stored = Some(ObjectDescriptor::from_record(&record));
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    let descriptor = stored.ok_or_else(|| Error::BadRequest {
        message: "Missing required field: 'file'".to_string(),
    })?;

    Ok((StatusCode::CREATED, Json(descriptor)))
}

#[utoipa::path(
    get,
    path = "/objects/{path}",
    tag = "objects",
    summary = "Download object",
    description = "Streams the object's bytes. The response carries `Content-Length` whenever the \
                   backend reports the size ahead of transfer.",
    params(("path" = String, Path, description = "Object path, e.g. `myfolder/img.jpg`")),
    responses(
        (status = 200, description = "Raw object bytes as `application/octet-stream`"),
        (status = 404, description = "No object at this path"),
        (status = 502, description = "Storage backend unreachable")
    )
)]
pub async fn download_object(State(state): State<AppState>, Path(raw_path): Path<String>) -> Result<Response<Body>> {
    let path = parse_path(&raw_path)?;

    let download = state.gateway.get_object(&path).await.map_err(|err| match err {
        StorageError::NotFound => Error::NotFound {
            resource: "Object".to_string(),
            id: path.to_string(),
        },
        other => Error::Storage(other),
    })?;

    tracing::debug!(path = %path, size = ?download.size, "object download started");

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream");
    if let Some(size) = download.size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    builder
        .body(Body::from_stream(download.stream))
        .map_err(|err| Error::Internal {
            operation: format!("build download response: {err}"),
        })
}
