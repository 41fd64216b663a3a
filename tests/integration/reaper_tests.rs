//! End-of-build cache sweep integration tests.
//!
//! Tests verify:
//! - Aged, unused cache files are deleted after a successful build
//! - Files used by the current run survive regardless of age
//! - The sweep never runs in serve mode, with the cache disabled, without a
//!   retention period, or after a failed build

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use imagetools::{RunMode, VariantConfig, VariantId};

use super::test_utils::{png_bytes, tools_with_mocks, TestProject};

const DAY: Duration = Duration::from_secs(86_400);

fn age(path: &Path, by: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - by).unwrap();
}

/// Put an aged file in the cache that no request of this run will touch.
fn stale_entry(project: &TestProject) -> std::path::PathBuf {
    let id = VariantId::derive(&VariantConfig::new().with("w", "1"), "stale");
    let path = project.cache_dir().join(id.as_str());
    std::fs::create_dir_all(project.cache_dir()).unwrap();
    std::fs::write(&path, png_bytes(1, 1)).unwrap();
    age(&path, 30 * DAY);
    path
}

#[tokio::test]
async fn test_build_end_deletes_stale_and_keeps_used() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 40));
    let stale = stale_entry(&project);

    let config = project
        .config(RunMode::Build)
        .with_cache_retention(Some(DAY.as_secs()));
    let (tools, _, _) = tools_with_mocks(config);

    let module = tools.load_module("photo.png?w=10").await.unwrap().unwrap();
    let used = project.cache_dir().join(module.ids[0].as_str());
    age(&used, 365 * DAY);

    let report = tools.build_end(false).await.unwrap();

    assert!(!stale.exists());
    assert!(used.exists());
    assert_eq!(report.deleted, 1);
    assert_eq!(report.kept, 1);
}

#[tokio::test]
async fn test_cache_hits_count_as_used() {
    let project = TestProject::new();
    project.write("photo.png", &png_bytes(40, 40));
    let config = project
        .config(RunMode::Build)
        .with_cache_retention(Some(DAY.as_secs()));

    // A previous run produced the entry
    let (previous, _, _) = tools_with_mocks(config.clone());
    let module = previous.load_module("photo.png?w=10").await.unwrap().unwrap();
    let entry = project.cache_dir().join(module.ids[0].as_str());
    age(&entry, 30 * DAY);

    // This run only hits it
    let (tools, transformer, _) = tools_with_mocks(config);
    tools.load("photo.png?w=10").await.unwrap();
    assert_eq!(transformer.calls(), 0);

    tools.build_end(false).await.unwrap();
    assert!(entry.exists());
}

#[tokio::test]
async fn test_no_sweep_after_failed_build() {
    let project = TestProject::new();
    let stale = stale_entry(&project);
    let config = project
        .config(RunMode::Build)
        .with_cache_retention(Some(DAY.as_secs()));
    let (tools, _, _) = tools_with_mocks(config);

    assert!(tools.build_end(true).await.is_none());
    assert!(stale.exists());
}

#[tokio::test]
async fn test_no_sweep_in_serve_mode() {
    let project = TestProject::new();
    let stale = stale_entry(&project);
    let config = project
        .config(RunMode::Serve)
        .with_cache_retention(Some(DAY.as_secs()));
    let (tools, _, _) = tools_with_mocks(config);

    assert!(tools.build_end(false).await.is_none());
    assert!(stale.exists());
}

#[tokio::test]
async fn test_no_sweep_without_retention() {
    let project = TestProject::new();
    let stale = stale_entry(&project);
    let (tools, _, _) = tools_with_mocks(project.config(RunMode::Build));

    assert!(tools.build_end(false).await.is_none());
    assert!(stale.exists());
}

#[tokio::test]
async fn test_no_sweep_with_cache_disabled() {
    let project = TestProject::new();
    let stale = stale_entry(&project);
    let config = project
        .config(RunMode::Build)
        .with_cache_enabled(false)
        .with_cache_retention(Some(0));
    let (tools, _, _) = tools_with_mocks(config);

    assert!(tools.build_end(false).await.is_none());
    assert!(stale.exists());
}
