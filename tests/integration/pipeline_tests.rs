//! Load-hook integration tests.
//!
//! Tests verify:
//! - Variant ids are deterministic and content-addressed
//! - Repeated requests reuse cached variants instead of transforming again
//! - Upscale clamping and multi-candidate expansion
//! - Inline, serve and build delivery
//! - Default directives and output formats

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use imagetools::error::{ConfigError, DecodeError, LoadError, TransformError};
use imagetools::{
    DefaultDirectives, DirectiveProvider, DirectiveSet, ImageRequest, ImageTools, RunMode,
    SourceAsset,
};

use super::test_utils::{decoded_width, jpeg_bytes, png_bytes, tools_with_mocks, TestProject};

// =============================================================================
// Pass-through
// =============================================================================

#[tokio::test]
async fn test_ids_without_directives_are_not_handled() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(20, 20));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Serve));

    assert!(tools.load("photo.png").await.unwrap().is_none());
    assert!(tools.load("photo.png?").await.unwrap().is_none());
    assert!(tools.load("script.ts?w=10").await.unwrap().is_none());
    assert!(tools.load("public/photo.png?w=10").await.unwrap().is_none());
    assert_eq!(transformer.calls(), 0);
}

#[tokio::test]
async fn test_missing_source_is_a_decode_error() {
    let project = TestProject::new();
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve));

    let result = tools.load("missing.png?w=10").await;
    assert!(matches!(
        result,
        Err(LoadError::Decode(DecodeError::Read { .. }))
    ));
}

// =============================================================================
// Identity and Reuse
// =============================================================================

#[tokio::test]
async fn test_variant_ids_are_deterministic() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(50, 50));

    let (first, _, _) = tools_with_mocks(project.config(RunMode::Serve));
    let (second, _, _) = tools_with_mocks(
        project
            .config(RunMode::Serve)
            .with_cache_enabled(false),
    );

    let a = first.load_module("photo.png?w=20").await.unwrap().unwrap();
    let b = second.load_module("photo.png?w=20").await.unwrap().unwrap();
    assert_eq!(a.ids, b.ids);
}

#[tokio::test]
async fn test_repeated_requests_transform_once() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(50, 50));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Serve));

    let first = tools.load("photo.png?w=20").await.unwrap().unwrap();
    let second = tools.load("photo.png?w=20").await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(transformer.calls(), 1);
    assert_eq!(project.cache_files().len(), 1);
}

#[tokio::test]
async fn test_cache_survives_across_instances() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(50, 50));

    let (first, first_transformer, _) = tools_with_mocks(project.config(RunMode::Build));
    first.load("photo.png?w=25").await.unwrap();
    assert_eq!(first_transformer.calls(), 1);

    let (second, second_transformer, _) = tools_with_mocks(project.config(RunMode::Build));
    let module = second.load_module("photo.png?w=25").await.unwrap().unwrap();
    assert_eq!(second_transformer.calls(), 0);
    assert_eq!(module.images[0].width, 25);
}

#[tokio::test]
async fn test_changed_source_changes_id() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(50, 50));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Serve));

    let before = tools.load_module("photo.png?w=20").await.unwrap().unwrap();
    project.write("photo.png", &png_bytes(60, 60));
    let after = tools.load_module("photo.png?w=20").await.unwrap().unwrap();

    assert_ne!(before.ids, after.ids);
    assert_eq!(transformer.calls(), 2);
}

#[tokio::test]
async fn test_disabled_cache_transforms_every_time() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(50, 50));
    let (tools, transformer, _) = tools_with_mocks(
        project
            .config(RunMode::Serve)
            .with_cache_enabled(false),
    );

    let module = tools.load_module("photo.png?w=20").await.unwrap().unwrap();
    tools.load("photo.png?w=20").await.unwrap();

    assert_eq!(transformer.calls(), 2);
    assert!(project.cache_files().is_empty());

    let entry = tools.registry().get(module.ids[0].as_str()).await.unwrap();
    assert!(entry.bytes.is_some());
}

#[tokio::test]
async fn test_failed_cache_write_keeps_variant_in_memory() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(50, 50));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve));

    std::fs::remove_dir_all(project.cache_dir()).unwrap();

    let module = tools.load_module("photo.png?w=20").await.unwrap().unwrap();
    let (bytes, metadata) = tools.serve(module.ids[0].as_str()).await.unwrap();

    assert_eq!(metadata.format, "png");
    assert_eq!(decoded_width(&bytes), 20);
}

// =============================================================================
// Directives
// =============================================================================

#[tokio::test]
async fn test_width_is_clamped_to_source() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(500, 10));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve));

    let oversized = tools.load_module("photo.png?w=9999").await.unwrap().unwrap();
    let exact = tools.load_module("photo.png?w=500").await.unwrap().unwrap();

    assert_eq!(oversized.images[0].width, 500);
    assert_eq!(oversized.ids, exact.ids);
}

#[tokio::test]
async fn test_allow_upscale_keeps_requested_width() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 10));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve));

    let module = tools
        .load_module("photo.png?w=80&allowUpscale=true")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(module.images[0].width, 80);
}

#[tokio::test]
async fn test_multiple_widths_yield_multiple_variants() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(300, 30));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Serve));

    let module = tools.load_module("photo.png?w=100;200").await.unwrap().unwrap();

    assert_eq!(module.ids.len(), 2);
    assert_ne!(module.ids[0], module.ids[1]);
    let widths: Vec<u32> = module.images.iter().map(|m| m.width).collect();
    assert_eq!(widths, vec![100, 200]);
    assert_eq!(transformer.calls(), 2);
    assert!(module.value.is_array());
}

#[tokio::test]
async fn test_static_default_directives() {
    let project = TestProject::new();
    project.write("photo.jpg", &jpeg_bytes(40, 40));
    let defaults = DirectiveSet::new().with("format", "png");
    let config = project
        .config(RunMode::Serve)
        .with_default_directives(DefaultDirectives::Static(defaults));
    let (tools, _, _) = tools_with_mocks(config);

    let module = tools.load_module("photo.jpg").await.unwrap().unwrap();
    assert_eq!(module.images[0].format, "png");

    // The request overrides the defaults
    let module = tools.load_module("photo.jpg?format=webp").await.unwrap().unwrap();
    assert_eq!(module.images[0].format, "webp");
}

struct HalfWidth;

#[async_trait]
impl DirectiveProvider for HalfWidth {
    async fn directives(
        &self,
        _request: &ImageRequest,
        source: &SourceAsset,
    ) -> Result<DirectiveSet, DecodeError> {
        let metadata = source.metadata().await?;
        Ok(DirectiveSet::new().with("w", (metadata.width / 2).to_string()))
    }
}

#[tokio::test]
async fn test_dynamic_default_directives() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(64, 8));
    let config = project
        .config(RunMode::Serve)
        .with_default_directives(DefaultDirectives::Dynamic(Arc::new(HalfWidth)));
    let (tools, _, _) = tools_with_mocks(config);

    let module = tools.load_module("photo.png").await.unwrap().unwrap();
    assert_eq!(module.images[0].width, 32);
}

#[tokio::test]
async fn test_unsupported_output_format() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(20, 20));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve));

    let result = tools.load("photo.png?format=bmp").await;
    assert!(matches!(
        result,
        Err(LoadError::Transform(TransformError::Config(
            ConfigError::UnsupportedFormat(_)
        )))
    ));
}

#[tokio::test]
async fn test_avif_variants_stay_avif_on_cache_hits() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 20));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Serve));

    let first = tools
        .load_module("photo.png?w=10;20&format=avif")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transformer.calls(), 2);
    for image in &first.images {
        assert_eq!(image.format, "avif");
    }

    let second = tools
        .load_module("photo.png?w=10;20&format=avif")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transformer.calls(), 2);
    assert_eq!(second.ids, first.ids);
    for image in &second.images {
        assert_eq!(image.format, "avif");
        assert_eq!(image.compression.as_deref(), Some("av1"));
    }
    assert_eq!(
        (second.images[0].width, second.images[1].width),
        (10, 20)
    );

    let (_, metadata) = tools.serve(second.ids[1].as_str()).await.unwrap();
    assert_eq!(metadata.content_type(), "image/avif");
}

#[tokio::test]
async fn test_metadata_carries_directive_values() {
    let project = TestProject::new();
    project.write("photo.jpg", &jpeg_bytes(40, 40));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve));

    for _ in 0..2 {
        // Miss, then hit
        let module = tools
            .load_module("photo.jpg?w=20&quality=60&as=metadata")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(module.value["quality"], 60);
        assert_eq!(module.value["w"], 20);
        assert_eq!(module.value["width"], 20);
        assert_eq!(module.value["format"], "jpeg");
    }
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_inline_yields_data_uri_in_every_mode() {
    for mode in [RunMode::Serve, RunMode::Build] {
        let project = TestProject::new();
        project.write("photo.png", &png_bytes(20, 20));
        let (tools, _, emitter) = tools_with_mocks(project.config(mode));

        let module = tools
            .load_module("photo.png?w=10&inline")
            .await
            .unwrap()
            .unwrap();

        let src = module.value.as_str().unwrap();
        assert!(src.starts_with("data:image/png;base64,"), "{mode:?}: {src}");
        assert!(emitter.names().await.is_empty());
        assert!(tools.registry().contains(module.ids[0].as_str()).await);
    }
}

#[tokio::test]
async fn test_serve_mode_uses_origin_and_base() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(20, 20));
    let config = project
        .config(RunMode::Serve)
        .with_origin("http://localhost:5173")
        .with_base("/app/");
    let (tools, _, _) = tools_with_mocks(config);

    let module = tools.load_module("photo.png?w=10").await.unwrap().unwrap();
    assert_eq!(
        module.value,
        json!(format!(
            "http://localhost:5173/app/@imagetools/{}",
            module.ids[0]
        ))
    );
}

#[tokio::test]
async fn test_build_mode_emits_assets() {
    let project = TestProject::new();
    project.write("img/photo.png", &png_bytes(40, 40));
    let (tools, _, emitter) = tools_with_mocks(project.config(RunMode::Build));

    let module = tools
        .load_module("img/photo.png?w=10;20&format=webp")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        emitter.names().await,
        vec!["img/photo.webp".to_string(), "img/photo.webp".to_string()]
    );
    assert_eq!(
        module.value,
        json!(["__VITE_ASSET__h0__", "__VITE_ASSET__h1__"])
    );
    assert_eq!(decoded_width(&emitter.bytes(1).await), 20);

    // Build-mode variants are registered as well
    for id in &module.ids {
        assert!(tools.registry().contains(id.as_str()).await);
    }
}

#[tokio::test]
async fn test_output_formats_and_named_exports() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(300, 300));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Serve).with_compact(true));

    let code = tools
        .load("photo.png?w=100;200&as=srcset")
        .await
        .unwrap()
        .unwrap();
    assert!(code.starts_with("export default\""));
    assert!(code.contains(" 100w, "));
    assert!(code.contains(" 200w\""));

    let code = tools
        .load("photo.png?w=100;200&as=img")
        .await
        .unwrap()
        .unwrap();
    assert!(code.contains("export const w=200;"));
    assert!(code.contains("export const h=200;"));
    assert!(code.contains("export const srcset="));
    let default_export = code.rsplit("export default").next().unwrap();
    for key in ["src", "srcset", "w", "h"] {
        assert!(default_export.contains(key), "missing {key} in {default_export}");
    }

    let module = tools
        .load_module("photo.png?w=100&as=meta:width;format")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(module.value, json!({ "width": 100, "format": "png" }));
}

#[tokio::test]
async fn test_named_exports_disabled() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(30, 30));
    let config = project
        .config(RunMode::Serve)
        .with_named_exports(false)
        .with_compact(true);
    let (tools, _, _) = tools_with_mocks(config);

    let code = tools
        .load("photo.png?w=10&as=metadata")
        .await
        .unwrap()
        .unwrap();
    assert!(code.starts_with("export default{"));
    assert!(!code.contains("export const"));
}

#[tokio::test]
async fn test_builtin_pipeline_without_mocks() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(30, 30));
    let tools = ImageTools::new(project.config(RunMode::Serve)).unwrap();

    let module = tools.load_module("photo.png?w=15").await.unwrap().unwrap();
    assert_eq!(module.images[0].width, 15);
    assert_eq!(project.cache_files(), vec![module.ids[0].to_string()]);
}
