//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the object endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! All endpoints are documented with OpenAPI annotations via `utoipa`;
//! interactive documentation is served at `/docs` when the server runs.

pub mod handlers;
pub mod models;
