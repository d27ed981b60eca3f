//! Indexing pipeline tests: real sources through the indexer into SQLite,
//! then back out through search.

mod common;

use appseek::commands::{execute_index, execute_stats};
use appseek::services::{BackgroundIndexer, IndexConfig, IndexerState};
use appseek::sources::{DiscoverySource, FilesystemScanConfig, FilesystemSource};
use appseek::{AppRepository, AppSource};
use common::{app, desktop_catalog, failing_source, names, static_source, TestEnv};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn filesystem_source(env: &TestEnv) -> Arc<dyn DiscoverySource> {
    Arc::new(FilesystemSource::new(FilesystemScanConfig {
        roots: vec![env.root().join("apps"), env.root().join("missing")],
        executable_extensions: vec!["exe".to_string()],
        ..FilesystemScanConfig::default()
    }))
}

#[tokio::test]
async fn test_filesystem_scan_to_search() {
    let env = TestEnv::new();
    env.write_executable("apps/Blender/blender.exe");
    env.write_executable("apps/Gimp/bin/gimp-2.10.exe");
    env.write_executable("apps/Tools/run.exe");
    env.write_executable("apps/Tools/uninstall.exe");
    env.write_executable("apps/Tools/lib/helper-lib.exe");

    let report = env.index(vec![filesystem_source(&env)]).await;
    assert_eq!(report.failed_sources, 0);
    assert_eq!(report.indexed, 3);
    assert!(report.committed);

    assert_eq!(names(&env.query("blender")), vec!["Blender"]);
    assert_eq!(names(&env.query("gim")), vec!["Gimp"]);
    assert_eq!(names(&env.query("tools")), vec!["Tools"]);
    assert!(env.query("uninstall").is_empty());
    assert!(env.query("helper").is_empty());

    let gimp = &env.query("gimp")[0].app;
    assert!(gimp.executable.ends_with("gimp-2.10.exe"));
    assert_eq!(gimp.source, AppSource::Filesystem);
    assert!(gimp.last_indexed.is_some());
}

#[tokio::test]
async fn test_shortcut_beats_filesystem_for_same_executable() {
    let env = TestEnv::new();
    let exe = env.write_executable("apps/Blender/blender.exe");
    let canonical = dunce::canonicalize(&exe).unwrap();

    let shortcut = static_source(
        AppSource::Shortcut,
        vec![app(
            "Blender 4.2",
            &canonical.to_string_lossy(),
            AppSource::Shortcut,
        )],
    );

    // Listed last, still scanned first by priority
    let report = env.index(vec![filesystem_source(&env), shortcut]).await;
    assert_eq!(report.discovered, 2);
    assert_eq!(report.indexed, 1);
    assert_eq!(report.duplicates, 1);

    let hits = env.query("blender");
    assert_eq!(names(&hits), vec!["Blender 4.2"]);
    assert_eq!(hits[0].app.source, AppSource::Shortcut);
}

#[tokio::test]
async fn test_reindex_keeps_ids_stable() {
    let env = TestEnv::new();
    env.index(vec![desktop_catalog()]).await;
    let first: Vec<_> = env.db.get_all().unwrap().iter().map(|a| a.id).collect();

    env.index(vec![desktop_catalog()]).await;
    let second: Vec<_> = env.db.get_all().unwrap().iter().map(|a| a.id).collect();

    assert_eq!(first, second);
    assert_eq!(env.db.app_count().unwrap(), 5);
}

#[tokio::test]
async fn test_failed_source_does_not_block_others() {
    let env = TestEnv::new();
    let report = env
        .index(vec![
            failing_source(AppSource::Registry, "registry unavailable"),
            desktop_catalog(),
        ])
        .await;

    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.indexed, 5);
    assert_eq!(names(&env.query("paint")), vec!["Paint"]);
}

#[tokio::test]
async fn test_nothing_discovered_keeps_existing_index() {
    let env = TestEnv::new();
    env.index(vec![desktop_catalog()]).await;
    env.query("calc");
    let before = env.cache.stats();

    let output = execute_index(
        &env.indexer(vec![failing_source(AppSource::Shortcut, "offline")]),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!output.report.committed);
    assert!(output.message.contains("existing index kept"));
    assert_eq!(env.cache.stats().invalidations, before.invalidations);
    assert_eq!(names(&env.query("calc")), vec!["Calculator"]);
}

#[tokio::test]
async fn test_stats_after_index() {
    let env = TestEnv::new();
    env.index(vec![
        desktop_catalog(),
        static_source(
            AppSource::Filesystem,
            vec![app("Blender", "/opt/blender/blender", AppSource::Filesystem)],
        ),
    ])
    .await;

    let stats = execute_stats(&env.db, Some(&env.cache)).unwrap();
    assert_eq!(stats.total_apps, 6);
    assert!(stats.total_tokens > 6);
    let shortcut = stats
        .by_source
        .iter()
        .find(|c| c.source == AppSource::Shortcut)
        .unwrap();
    assert_eq!(shortcut.count, 5);
}

#[tokio::test]
async fn test_background_indexer_reindexes_on_interval() {
    let env = TestEnv::new();
    let indexer = Arc::new(env.indexer(vec![desktop_catalog()]));
    let background = BackgroundIndexer::new(
        indexer,
        IndexConfig {
            reindex_interval_secs: Some(1),
            stop_timeout_ms: 2000,
        },
    );

    background.start_indexing(&CancellationToken::new()).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while background.completed_runs() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(background.completed_runs() >= 2);
    assert_eq!(background.state(), IndexerState::Running);

    background.stop_indexing(&CancellationToken::new()).await.unwrap();
    assert_eq!(background.state(), IndexerState::Idle);
    assert_eq!(background.last_report().unwrap().indexed, 5);
    assert_eq!(names(&env.query("keynote")), vec!["Keynote"]);
}
