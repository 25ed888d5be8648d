//! Common type definitions.
//!
//! The central type here is [`ObjectPath`], the validated hierarchical key
//! under which an object is stored. Paths look like filesystem paths
//! (`myfolder/img.jpg`) but objects are stored flat, keyed by the full
//! path; the hierarchy is virtual.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Reasons an object path can be rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidObjectPath {
    #[error("object path must not be empty")]
    Empty,
    #[error("object path must not contain empty segments")]
    EmptySegment,
    #[error("object path must not contain '.' or '..' segments")]
    RelativeSegment,
}

/// A validated object key.
///
/// Invariants (enforced by [`FromStr`]):
/// - non-empty after trimming leading slashes
/// - no empty segments (`a//b` is rejected)
/// - no `.` or `..` segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[schema(value_type = String, example = "myfolder/img.jpg")]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the `/`-separated segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl FromStr for ObjectPath {
    type Err = InvalidObjectPath;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(InvalidObjectPath::Empty);
        }
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(InvalidObjectPath::EmptySegment);
            }
            if segment == "." || segment == ".." {
                return Err(InvalidObjectPath::RelativeSegment);
            }
        }
        Ok(ObjectPath(trimmed.to_string()))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_paths_and_trims_leading_slashes() {
        let path: ObjectPath = "/myfolder/img.jpg".parse().unwrap();
        assert_eq!(path.as_str(), "myfolder/img.jpg");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["myfolder", "img.jpg"]);
    }

    #[test]
    fn rejects_empty_and_relative_paths() {
        assert_eq!("".parse::<ObjectPath>(), Err(InvalidObjectPath::Empty));
        assert_eq!("///".parse::<ObjectPath>(), Err(InvalidObjectPath::Empty));
        assert_eq!("a//b".parse::<ObjectPath>(), Err(InvalidObjectPath::EmptySegment));
        assert_eq!("a/../b".parse::<ObjectPath>(), Err(InvalidObjectPath::RelativeSegment));
        assert_eq!("./a".parse::<ObjectPath>(), Err(InvalidObjectPath::RelativeSegment));
    }
}
