//! API request and response data models.
//!
//! These models define the public API contract. They are distinct from the
//! storage-layer records so the wire format and the backend representation
//! can evolve independently; conversions live on the model types.

pub mod objects;
