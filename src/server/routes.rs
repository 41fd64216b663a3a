//! Router configuration for the dev server.
//!
//! # Route Structure
//!
//! ```text
//! /health                     - Health check
//! /@load/{*path}?{query}      - Load hook over HTTP (optional)
//! <base>/@imagetools/{id}     - Generated variants (dev middleware)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use imagetools::config::{PluginConfig, RunMode};
//! use imagetools::server::{create_router, RouterConfig};
//! use imagetools::ImageTools;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tools = ImageTools::new(PluginConfig::default().with_mode(RunMode::Serve))?;
//!
//!     let config = RouterConfig::new()
//!         .with_cors_origins(vec!["http://localhost:3000".to_string()]);
//!     let router = create_router(Arc::new(tools), config);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:5173").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{dev_middleware, health_handler, load_handler, not_found_handler, AppState};
use crate::plugin::ImageTools;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to expose the `/@load/` endpoint
    pub enable_load_endpoint: bool,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - The load endpoint is enabled
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_load_endpoint: true,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable the `/@load/` endpoint.
    pub fn with_load_endpoint(mut self, enabled: bool) -> Self {
        self.enable_load_endpoint = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the dev server router.
///
/// The dev middleware wraps every route, including the fallback, so variant
/// URLs are answered before routing and everything else falls through.
pub fn create_router(tools: Arc<ImageTools>, config: RouterConfig) -> Router {
    let state = AppState::new(tools);
    let cors = build_cors_layer(&config);

    let mut router = Router::new().route("/health", get(health_handler));
    if config.enable_load_endpoint {
        router = router.route("/@load/{*path}", get(load_handler));
    }

    let router = router
        .fallback(not_found_handler)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, dev_middleware))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
