//! HTTP request handlers.
//!
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Business logic execution via the gateway service
//! - Response serialization
//!
//! Handlers return [`crate::errors::Error`] which converts to the
//! appropriate HTTP status code and a user-safe message.

pub mod objects;
