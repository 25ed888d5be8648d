use crate::gateway::ObjectRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing objects
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListObjectsQuery {
    /// Virtual directory-like filter over object paths
    pub prefix: Option<String>,

    /// Descend into nested virtual directories (default true)
    #[serde(default = "default_recursive")]
    #[param(default = true)]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

/// Metadata record describing a stored object
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ObjectDescriptor {
    /// Full object key within the bucket
    pub path: String,
    /// Object size in bytes
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Static retrieval locator for the object's bytes
    pub url: String,
}

impl ObjectDescriptor {
    /// Convert from the gateway's record
    pub fn from_record(record: &ObjectRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size,
            title: record.title.clone(),
            description: record.description.clone(),
            url: record.url.to_string(),
        }
    }
}
