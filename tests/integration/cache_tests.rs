//! Cache validity integration tests.
//!
//! Tests verify:
//! - Stored bytes come back unchanged
//! - Empty, truncated and corrupt entries are treated as misses and regenerated
//! - Concurrent identical requests leave one complete entry

use std::sync::Arc;

use bytes::Bytes;

use imagetools::{RunMode, VariantCache, VariantConfig, VariantId};

use super::test_utils::{decoded_width, png_bytes, tools_with_mocks, TestProject};

#[tokio::test]
async fn test_store_then_lookup_returns_identical_bytes() {
    let project = TestProject::new();
    let cache = VariantCache::open(project.cache_dir()).unwrap();

    let config = VariantConfig::new().with("w", "12").with("format", "png");
    let id = VariantId::derive(&config, "digest");
    let bytes = Bytes::from(png_bytes(12, 3));

    cache.store(&id, &bytes).await.unwrap();
    let hit = cache.lookup(&id, &config).await.unwrap();

    assert_eq!(hit.bytes, bytes);
    assert_eq!(hit.metadata.width, 12);
    assert_eq!(hit.metadata.format, "png");
}

#[tokio::test]
async fn test_empty_entry_is_regenerated() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 40));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Build));

    let module = tools.load_module("photo.png?w=10").await.unwrap().unwrap();
    let path = project.cache_dir().join(module.ids[0].as_str());
    std::fs::write(&path, b"").unwrap();

    tools.load("photo.png?w=10").await.unwrap();
    assert_eq!(transformer.calls(), 2);
    assert_eq!(decoded_width(&std::fs::read(&path).unwrap()), 10);
}

#[tokio::test]
async fn test_truncated_entry_is_regenerated() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 40));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Build));

    let module = tools.load_module("photo.png?w=10").await.unwrap().unwrap();
    let path = project.cache_dir().join(module.ids[0].as_str());
    let full = std::fs::read(&path).unwrap();
    std::fs::write(&path, &full[..full.len() / 2]).unwrap();

    let again = tools.load_module("photo.png?w=10").await.unwrap().unwrap();
    assert_eq!(transformer.calls(), 2);
    assert_eq!(again.ids, module.ids);
    assert_eq!(std::fs::read(&path).unwrap(), full);
}

#[tokio::test]
async fn test_garbage_entry_is_regenerated() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 40));
    let (tools, transformer, _) = tools_with_mocks(project.config(RunMode::Build));

    let module = tools.load_module("photo.png?w=10").await.unwrap().unwrap();
    let path = project.cache_dir().join(module.ids[0].as_str());
    std::fs::write(&path, b"definitely not an image").unwrap();

    tools.load("photo.png?w=10").await.unwrap();
    assert_eq!(transformer.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_leave_one_complete_entry() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(64, 64));
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Build));
    let tools = Arc::new(tools);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tools = Arc::clone(&tools);
            tokio::spawn(async move { tools.load_module("photo.png?w=32").await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let module = handle.await.unwrap().unwrap().unwrap();
        ids.push(module.ids[0].clone());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    assert_eq!(project.cache_files(), vec![ids[0].to_string()]);
    let stored = std::fs::read(project.cache_dir().join(ids[0].as_str())).unwrap();
    assert_eq!(decoded_width(&stored), 32);
}
