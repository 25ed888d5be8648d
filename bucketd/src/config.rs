//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The configuration file path defaults to `config.yaml` but can
//! be specified via the `-f` flag or `BUCKETD_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources
//! override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `BUCKETD_`
//!
//! For nested config values, use double underscores in environment
//! variables. For example, `BUCKETD_STORAGE__BUCKET=media` sets the
//! `storage.bucket` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Public URL**: `public_url` - base address used to derive the
//!   retrieval locator embedded in object descriptors
//! - **Storage**: `storage.backend` - `s3` (any S3-compatible endpoint) or
//!   `memory` (process-local, for development and tests)
//! - **Objects**: `objects.max_object_size` - upload size cap in bytes
//! - **Security**: `cors` - CORS origins for browser clients
//! - **Features**: `enable_metrics` - Prometheus endpoint toggle
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! BUCKETD_PORT=8080
//!
//! # Point the S3 backend at a MinIO instance
//! BUCKETD_STORAGE__BACKEND=s3
//! BUCKETD_STORAGE__BUCKET=media
//! BUCKETD_STORAGE__ENDPOINT_URL=http://localhost:9000
//! ```

use crate::errors::Error;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BUCKETD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment
/// variables. All fields have sensible defaults defined in the `Default`
/// implementation; the default storage backend is in-memory so the service
/// can be started without any external dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL under which this gateway is publicly reachable. Retrieval
    /// locators in object descriptors are composed from this address.
    pub public_url: Url,
    /// Object store backend configuration
    pub storage: StorageConfig,
    /// Object handling limits
    pub objects: ObjectsConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://localhost:8080"
                .parse()
                .expect("default public_url is a valid URL"),
            storage: StorageConfig::default(),
            objects: ObjectsConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
        }
    }
}

/// Object store backend configuration.
///
/// The bucket is configured once per service instance and is assumed to
/// exist; the gateway never creates or destroys buckets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Any S3-compatible object store (AWS S3, MinIO, Ceph RGW, ...)
    S3(S3StorageConfig),
    /// Process-local in-memory store, for development and tests
    Memory(MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(MemoryStorageConfig {
            bucket: "bucketd".to_string(),
        })
    }
}

impl StorageConfig {
    /// The configured bucket name, whichever backend is selected
    pub fn bucket(&self) -> &str {
        match self {
            StorageConfig::S3(config) => &config.bucket,
            StorageConfig::Memory(config) => &config.bucket,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3StorageConfig {
    /// Bucket all objects are stored in
    pub bucket: String,
    /// Endpoint override for S3-compatible servers (e.g. a MinIO address).
    /// Leave unset for AWS S3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<Url>,
    /// Region; falls back to the SDK's default provider chain when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Use path-style addressing (`host/bucket/key`). Most self-hosted
    /// S3-compatible servers require this, so it defaults to on.
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    /// Static access key. When unset, credentials come from the standard
    /// AWS provider chain (environment, profile, instance role).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// Static secret key, paired with `access_key_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

fn default_force_path_style() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryStorageConfig {
    /// Bucket name, used only for logging with this backend
    pub bucket: String,
}

/// Object handling limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObjectsConfig {
    /// Maximum accepted upload size in bytes
    pub max_object_size: u64,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            max_object_size: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

/// CORS configuration for browser clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to call the API. `"*"` allows any origin.
    pub allowed_origins: Vec<CorsOrigin>,
    /// Whether to allow credentialed cross-origin requests
    pub allow_credentials: bool,
    /// Preflight cache duration in seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: None,
        }
    }
}

/// A single allowed CORS origin: either the wildcard `"*"` or a URL.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigin {
    Wildcard,
    Url(Url),
}

impl Serialize for CorsOrigin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CorsOrigin::Wildcard => serializer.serialize_str("*"),
            CorsOrigin::Url(url) => serializer.serialize_str(url.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for CorsOrigin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "*" {
            Ok(CorsOrigin::Wildcard)
        } else {
            Url::parse(&raw).map(CorsOrigin::Url).map_err(serde::de::Error::custom)
        }
    }
}

impl Config {
    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // BUCKETD_CONFIG selects the file itself and is not a config key
            .merge(Env::prefixed("BUCKETD_").split("__").ignore(&["config"]))
    }

    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// The address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.storage.bucket().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.bucket must not be empty".to_string(),
            });
        }

        if self.public_url.cannot_be_a_base() {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: public_url '{}' cannot be used as a base URL",
                    self.public_url
                ),
            });
        }

        if self.objects.max_object_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: objects.max_object_size must be greater than zero".to_string(),
            });
        }

        if self.cors.allow_credentials && self.cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
            return Err(Error::Internal {
                operation: "Config validation: cors.allow_credentials cannot be combined with a \
                     wildcard origin"
                    .to_string(),
            });
        }

        if let StorageConfig::S3(s3) = &self.storage {
            if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
                return Err(Error::Internal {
                    operation: "Config validation: storage.access_key_id and storage.secret_access_key \
                         must be set together"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.storage.bucket(), "bucketd");
    }

    #[test]
    fn test_s3_config_from_yaml_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9000
public_url: https://files.example.com
storage:
  backend: s3
  bucket: media
  endpoint_url: http://localhost:9000
  region: us-east-1
"#,
            )?;
            jail.set_env("BUCKETD_PORT", "9001");
            jail.set_env("BUCKETD_STORAGE__BUCKET", "media-staging");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args)?;

            assert_eq!(config.port, 9001);
            assert_eq!(config.public_url.as_str(), "https://files.example.com/");
            match &config.storage {
                StorageConfig::S3(s3) => {
                    assert_eq!(s3.bucket, "media-staging");
                    assert_eq!(s3.endpoint_url.as_ref().map(|u| u.as_str()), Some("http://localhost:9000/"));
                    assert_eq!(s3.region.as_deref(), Some("us-east-1"));
                    assert!(s3.force_path_style);
                }
                other => panic!("expected S3 backend, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn test_empty_bucket_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  backend: memory
  bucket: ""
"#,
            )?;
            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            assert!(Config::load(&args).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_partial_static_credentials_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  backend: s3
  bucket: media
  access_key_id: only-half-of-a-key-pair
"#,
            )?;
            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            assert!(Config::load(&args).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_cors_origin_parsing() {
        let wildcard: CorsOrigin = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(wildcard, CorsOrigin::Wildcard);

        let url: CorsOrigin = serde_json::from_str("\"https://app.example.com\"").unwrap();
        match url {
            CorsOrigin::Url(url) => assert_eq!(url.as_str(), "https://app.example.com/"),
            other => panic!("expected URL origin, got {other:?}"),
        }

        assert!(serde_json::from_str::<CorsOrigin>("\"not a url\"").is_err());
    }
}
