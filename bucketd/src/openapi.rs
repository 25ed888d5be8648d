//! OpenAPI documentation configuration.
//!
//! Aggregates the object endpoints into a single spec, served interactively
//! at `/docs`.

use crate::api;
use crate::api::models::objects::ObjectDescriptor;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "bucketd",
        description = "A stateless HTTP gateway in front of an S3-compatible object store: \
                       list objects under a prefix, upload objects, download objects by path."
    ),
    paths(
        api::handlers::objects::list_objects,
        api::handlers::objects::upload_object,
        api::handlers::objects::upload_object_form,
        api::handlers::objects::download_object,
    ),
    components(schemas(ObjectDescriptor)),
    tags(
        (name = "objects", description = "List, upload, and download objects in the configured bucket")
    )
)]
pub struct ApiDoc;
