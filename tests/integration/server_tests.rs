//! Dev server integration tests.
//!
//! Tests verify:
//! - Variants loaded over `/@load/` are served under the dev prefix
//! - Content types follow the variant format
//! - Unknown ids are internal errors (HTTP 500)
//! - Requests outside the prefix pass through to the router

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use imagetools::{create_router, ImageTools, PluginConfig, RouterConfig, RunMode};

use super::test_utils::{decoded_width, png_bytes, tools_with_mocks, TestProject};

fn router_for(tools: ImageTools) -> (Router, Arc<ImageTools>) {
    let tools = Arc::new(tools);
    let router = create_router(tools.clone(), RouterConfig::new().with_tracing(false));
    (router, tools)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn serve_config(project: &TestProject) -> PluginConfig {
    project.config(RunMode::Serve)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["variants"], 0);
}

// =============================================================================
// Load and Serve
// =============================================================================

#[tokio::test]
async fn test_load_then_serve_variant() {
    let project = TestProject::new();
    project.write("img/photo.png", &png_bytes(60, 30));
    let (router, tools) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let response = router
        .clone()
        .oneshot(get("/@load/img/photo.png?w=30&format=webp"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/javascript"));

    let code = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    let ids = tools.registry().ids().await;
    assert_eq!(ids.len(), 1);
    let id = ids.into_iter().next().unwrap();
    let url = format!("/@imagetools/{id}");
    assert!(code.contains(&url), "{code}");

    let response = router.oneshot(get(&url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/webp");
    assert_eq!(decoded_width(&body_bytes(response).await), 30);
}

#[tokio::test]
async fn test_serve_in_memory_variant() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(20, 20));
    let config = serve_config(&project).with_cache_enabled(false);
    let (tools, _, _) = tools_with_mocks(config);
    let (router, tools) = router_for(tools);

    let module = tools.load_module("photo.png?w=8").await.unwrap().unwrap();
    assert!(project.cache_files().is_empty());

    let uri = format!("/@imagetools/{}", module.ids[0]);
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(decoded_width(&body_bytes(response).await), 8);
}

#[tokio::test]
async fn test_serve_under_custom_base() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(20, 20));
    let config = serve_config(&project).with_base("/app/");
    let (router, tools) = router_for(ImageTools::new(config).unwrap());

    let module = tools.load_module("photo.png?w=5").await.unwrap().unwrap();

    let uri = format!("/app/@imagetools/{}", module.ids[0]);
    let response = router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The default prefix is not served
    let uri = format!("/@imagetools/{}", module.ids[0]);
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_unknown_id_is_internal_error() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let uri = format!("/@imagetools/{}", "ab".repeat(32));
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "internal_error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("cannot find image with id"));
}

#[tokio::test]
async fn test_non_get_on_prefix_is_rejected() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/@imagetools/whatever")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_other_paths_pass_through() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let response = router.oneshot(get("/src/main.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_load_non_image_is_not_handled() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let response = router.oneshot(get("/@load/readme.md?w=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_handled");
}

#[tokio::test]
async fn test_load_missing_source() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let response = router.oneshot(get("/@load/missing.png?w=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_load_rejects_parent_paths() {
    let project = TestProject::new();
    let (router, _) = router_for(ImageTools::new(serve_config(&project)).unwrap());

    let response = router
        .oneshot(get("/@load/a/../../secret.png?w=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_load_endpoint_can_be_disabled() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(10, 10));
    let tools = Arc::new(ImageTools::new(serve_config(&project)).unwrap());
    let router = create_router(
        tools,
        RouterConfig::new()
            .with_load_endpoint(false)
            .with_tracing(false),
    );

    let response = router.oneshot(get("/@load/photo.png?w=5")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
