//! Test utilities for integration testing (available with the `test-utils`
//! feature).

use crate::config::Config;
use crate::storage::ObjectStore;
use axum_test::TestServer;
use std::sync::Arc;

/// Default test configuration: in-memory backend, ephemeral port.
pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

/// Spin up the full application against the in-memory backend.
pub async fn create_test_app() -> TestServer {
    let config = create_test_config();
    let app = crate::Application::new(config).await.expect("Failed to create application");
    app.into_test_server()
}

/// Spin up the full application with an injected backend, for tests that
/// need specific backend behavior (e.g. simulated outages).
pub async fn create_test_app_with_store(store: Arc<dyn ObjectStore>) -> TestServer {
    let config = create_test_config();
    let app = crate::Application::with_store(config, store).expect("Failed to create application");
    app.into_test_server()
}
