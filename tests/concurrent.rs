//! Concurrent access tests.
//!
//! Searches run from many threads against one cache while the indexer
//! writes through it.

mod common;

use appseek::services::{CachingRepository, SearchConfig, SearchService};
use appseek::{AppRepository, AppSource};
use common::{app, desktop_catalog, static_source, FlakyRepository, TestEnv};
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_concurrent_searches_agree() {
    let env = TestEnv::new();
    env.index(vec![desktop_catalog()]).await;
    let expected = env.query("note");

    thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let cancel = CancellationToken::new();
                    (0..50)
                        .map(|_| env.search.search("note", &cancel).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for hits in handle.join().unwrap() {
                assert_eq!(hits, expected);
            }
        }
    });
}

#[test]
fn test_cold_cache_loads_once_under_contention() {
    let repo = Arc::new(FlakyRepository::new());
    let cache = Arc::new(CachingRepository::new(
        Arc::clone(&repo) as Arc<dyn AppRepository>
    ));
    let service = SearchService::new(
        Arc::clone(&cache) as Arc<dyn AppRepository>,
        SearchConfig::default(),
    );

    thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|| {
                let cancel = CancellationToken::new();
                service.search("visual studio", &cancel).unwrap();
            });
        }
    });

    // Only the full-scan snapshot was requested
    assert_eq!(repo.reads(), 1);
    let stats = cache.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.hits + stats.misses, 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_see_whole_batches_only() {
    let env = Arc::new(TestEnv::new());
    let apps = (0..200)
        .map(|i| app(&format!("Game {i:03}"), &format!("/games/{i}"), AppSource::Filesystem))
        .collect();
    let indexer = env.indexer(vec![static_source(AppSource::Filesystem, apps)]);

    let reader = {
        let env = Arc::clone(&env);
        tokio::task::spawn_blocking(move || {
            let cancel = CancellationToken::new();
            let mut observed = Vec::new();
            for _ in 0..500 {
                observed.push(env.cache.get_all().unwrap().len());
                env.search.search("game", &cancel).unwrap();
            }
            observed
        })
    };

    let report = indexer.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.indexed, 200);

    // Each read sees either the empty index or the whole batch
    for len in reader.await.unwrap() {
        assert!(len == 0 || len == 200, "partial batch visible: {len}");
    }
    assert_eq!(env.query("game").len(), 20);
}

#[tokio::test]
async fn test_cancelled_search_does_not_disturb_others() {
    let env = TestEnv::new();
    env.index(vec![desktop_catalog()]).await;

    let cancelled = CancellationToken::new();
    cancelled.cancel();

    thread::scope(|s| {
        let doomed = s.spawn(|| env.search.search("paint", &cancelled));
        let live = s.spawn(|| env.search.search("paint", &CancellationToken::new()));

        assert!(doomed.join().unwrap().unwrap_err().is_cancelled());
        assert_eq!(live.join().unwrap().unwrap().len(), 1);
    });
}
