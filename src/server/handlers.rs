//! HTTP handlers and the dev middleware.
//!
//! # Endpoints
//!
//! - `GET <base>/@imagetools/{id}` - Serve a generated variant (middleware)
//! - `GET /@load/{*path}?{directives}` - Run the load hook for an image id
//! - `GET /health` - Health check endpoint

use std::path::Component;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, RawQuery, Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{CacheError, DecodeError, LoadError, ServeError, TransformError};
use crate::plugin::ImageTools;

// =============================================================================
// Application State
// =============================================================================

/// Shared state for handlers and the dev middleware.
#[derive(Clone)]
pub struct AppState {
    /// The image pipeline
    pub tools: Arc<ImageTools>,

    /// URL path under which variants are served, e.g. "/@imagetools/"
    pub dev_prefix: Arc<str>,
}

impl AppState {
    pub fn new(tools: Arc<ImageTools>) -> Self {
        let dev_prefix = route_path(tools.base_path());
        Self {
            tools,
            dev_prefix: dev_prefix.into(),
        }
    }
}

/// Path part of a base path that may be a full URL.
fn route_path(base_path: &str) -> String {
    if base_path.contains("://") {
        if let Ok(url) = url::Url::parse(base_path) {
            return url.path().to_string();
        }
    }
    base_path.to_string()
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "internal_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Variants registered with the dev server
    pub variants: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

fn decode_status(err: &DecodeError) -> (StatusCode, &'static str) {
    match err {
        DecodeError::Read { .. } => (StatusCode::NOT_FOUND, "not_found"),
        DecodeError::UnsupportedFormat { .. } | DecodeError::Malformed { .. } => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
        }
    }
}

/// Convert LoadError to HTTP response.
///
/// - unreadable source: 404
/// - undecodable source: 415
/// - bad directives: 400
/// - encode, cache and emit failures: 500
impl IntoResponse for LoadError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            LoadError::Decode(e) | LoadError::Transform(TransformError::Decode(e)) => {
                decode_status(e)
            }
            LoadError::Config(_) | LoadError::Transform(TransformError::Config(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_directive")
            }
            LoadError::Transform(TransformError::Encode { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "encode_error")
            }
            LoadError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
            LoadError::Emit(_) => (StatusCode::INTERNAL_SERVER_ERROR, "emit_error"),
        };

        error_response(status, error_type, self.to_string())
    }
}

/// Convert ServeError to HTTP response.
///
/// Every serve failure is a 500: ids under the dev prefix are only ever
/// handed out after registration.
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let error_type = match &self {
            ServeError::UnknownImage { .. } => "internal_error",
            ServeError::Cache(CacheError::Read { .. }) => "cache_read_error",
            ServeError::Cache(_) => "cache_error",
        };

        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_type,
            self.to_string(),
        )
    }
}

// =============================================================================
// Dev Middleware
// =============================================================================

/// Serve registered variants under the dev prefix.
///
/// Requests outside the prefix are passed on untouched. Inside it, only GET
/// and HEAD are allowed, and the remainder of the path is the variant id.
///
/// # Response
///
/// - `200 OK`: the image, `Content-Type: image/<format>`
/// - `405 Method Not Allowed`: any other method
/// - `500 Internal Server Error`: unregistered id or unreadable cache file
pub async fn dev_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServeError> {
    let Some(id) = request.uri().path().strip_prefix(&*state.dev_prefix) else {
        return Ok(next.run(request).await);
    };

    if request.method() != Method::GET && request.method() != Method::HEAD {
        return Ok(error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            format!("{} is not allowed on {}", request.method(), state.dev_prefix),
        ));
    }

    let (bytes, metadata) = state.tools.serve(id).await?;
    debug!(id = %id, format = %metadata.format, size = bytes.len(), "Serving variant");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, metadata.content_type())
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "variants": 12
/// }
/// ```
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        variants: state.tools.registry().len().await,
    })
}

/// Run the load hook over HTTP.
///
/// # Endpoint
///
/// `GET /@load/{*path}?{directives}`, e.g. `/@load/src/photo.jpg?w=400;800`
///
/// # Response
///
/// - `200 OK`: module text, `Content-Type: text/javascript`
/// - `400 Bad Request`: path escapes the root, or invalid directives
/// - `404 Not Found`: not an image request, or the source does not exist
/// - `415 Unsupported Media Type`: source cannot be decoded
pub async fn load_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, LoadError> {
    let escapes_root = std::path::Path::new(&path)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir));
    if escapes_root {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("Path must stay inside the project root: {}", path),
        ));
    }

    let id = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };

    match state.tools.load(&id).await? {
        Some(code) => Ok((
            [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
            code,
        )
            .into_response()),
        None => Ok(error_response(
            StatusCode::NOT_FOUND,
            "not_handled",
            format!("Not an image request: {}", id),
        )),
    }
}

/// Fallback for unmatched routes.
pub async fn not_found_handler(request: Request) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("No route for {}", request.uri().path()),
    )
}
