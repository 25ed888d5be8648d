//! # bucketd: an object-store gateway
//!
//! `bucketd` is a stateless HTTP service in front of an S3-compatible
//! object store. It exposes three operations over one configured bucket:
//! list objects under a prefix, upload an object, and download an object by
//! path. Everything durable — storage, consistency, backend authentication,
//! replication — is the storage service's job; this service translates HTTP
//! requests into backend calls and shapes the results into a uniform
//! response model.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) and
//! layered top to bottom as:
//!
//! - **API layer** ([`api`]): route handlers and the wire-format models.
//!   Handlers validate input, call the gateway, and map errors to status
//!   codes via [`errors::Error`].
//! - **Gateway service** ([`gateway`]): the three operations, independent of
//!   HTTP. Holds an injected [`storage::ObjectStore`] handle and the public
//!   base URL used to derive static retrieval locators. Stateless across
//!   calls; uploads and downloads stream through it without whole-object
//!   buffering.
//! - **Storage layer** ([`storage`]): the backend capability trait plus an
//!   S3 implementation (AWS S3, MinIO, or any S3-compatible endpoint) and an
//!   in-memory implementation for tests and development. The backend is
//!   chosen by configuration at startup and injected into the gateway, so
//!   backend lifecycle belongs to the process, not to a global.
//!
//! Failures are always distinguishable: a backend outage during a listing
//! surfaces as `502`, never as an empty array, and a missing object on
//! download is a `404`, never an empty body.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use bucketd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = bucketd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     bucketd::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options and the environment
//! variable override scheme.

pub mod api;
pub mod config;
pub mod errors;
pub mod gateway;
mod openapi;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::gateway::Gateway;
use crate::openapi::ApiDoc;
use crate::storage::ObjectStore;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router,
    routing::{get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
pub use types::ObjectPath;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Cheap to clone: the gateway is behind an `Arc` and the config is small.
#[derive(Clone, Builder)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub config: Config,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.origin().ascii_serialization().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - Object endpoints (list, upload, download)
/// - `/healthz` liveness probe
/// - Interactive API docs at `/docs`
/// - Optional Prometheus metrics at `/internal/metrics`
/// - CORS and tracing middleware
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let max_object_size = usize::try_from(state.config.objects.max_object_size).unwrap_or(usize::MAX);

    let read_routes = Router::new()
        .route("/objects", get(api::handlers::objects::list_objects))
        .route("/objects/{*path}", get(api::handlers::objects::download_object));

    // Upload routes carry the configured body limit; reads are unaffected.
    let upload_routes = Router::new()
        .route("/objects", post(api::handlers::objects::upload_object_form))
        .route("/objects/{*path}", put(api::handlers::objects::upload_object))
        .layer(DefaultBodyLimit::max(max_object_size));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(read_routes)
        .merge(upload_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the configured storage backend
///    and wires it through the gateway into the router
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
///
/// The service keeps no state outside the backend object store, so
/// restarting it is always safe.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with the configured backend
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = storage::create_object_store(&config.storage).await?;
        Self::with_store(config, store)
    }

    /// Create an application around an already-constructed backend.
    /// Used by tests to inject backend doubles.
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> anyhow::Result<Self> {
        debug!("Starting gateway with configuration: {:#?}", config);

        let gateway = Arc::new(Gateway::new(store, config.public_url.clone()));
        let state = AppState::builder().gateway(gateway).config(config.clone()).build();
        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Object store gateway listening on http://{}, serving bucket '{}'",
            bind_addr,
            self.config.storage.bucket()
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutdown complete");
        Ok(())
    }
}
