//! Integration tests for offline-first synchronization.
//!
//! Each test creates its own in-memory SQLite database and drives the sync
//! engine with a scripted remote source and a manually switched network.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hn_reader::connectivity::ManualConnectivity;
use hn_reader::remote::{FetchError, HnClient, RemoteSource};
use hn_reader::storage::{Article, ArticleStore, Database, StoredArticle};
use hn_reader::sync::{ArticlesRepository, SyncEngine, SyncError};

fn test_article(id: &str, title: &str, created_at_i: i64) -> Article {
    Article {
        object_id: id.to_string(),
        title: Some(title.to_string()),
        story_title: None,
        author: Some("pg".to_string()),
        url: Some(format!("https://example.com/{}", id)),
        story_url: None,
        comment_text: None,
        created_at: "2024-01-01T00:00:00.000Z".to_string(),
        created_at_i,
        points: Some(1),
    }
}

fn ids(articles: &[Article]) -> Vec<&str> {
    articles.iter().map(|a| a.object_id.as_str()).collect()
}

/// Remote source that serves whatever it was last given.
struct ScriptedRemote {
    response: Mutex<Result<Vec<Article>, u16>>,
    calls: AtomicUsize,
}

impl ScriptedRemote {
    fn serving(articles: Vec<Article>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(articles)),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Err(status)),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn fetch_articles(&self, _query: &str) -> Result<Vec<Article>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.response.lock().unwrap() {
            Ok(articles) => Ok(articles.clone()),
            Err(status) => Err(FetchError::HttpStatus(*status)),
        }
    }
}

/// Store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl ArticleStore for BrokenStore {
    async fn query_all(&self) -> anyhow::Result<Vec<Article>> {
        anyhow::bail!("disk I/O error")
    }

    fn observe(&self) -> BoxStream<'static, anyhow::Result<Vec<Article>>> {
        futures::stream::iter(vec![Err(anyhow::anyhow!("disk I/O error"))])
            .chain(futures::stream::pending())
            .boxed()
    }

    async fn upsert_batch(&self, _articles: &[Article]) -> anyhow::Result<()> {
        anyhow::bail!("disk I/O error")
    }

    async fn soft_delete(&self, _object_id: &str) -> anyhow::Result<()> {
        anyhow::bail!("disk I/O error")
    }

    async fn purge_deleted(&self) -> anyhow::Result<u64> {
        anyhow::bail!("disk I/O error")
    }

    async fn get_by_id(&self, _object_id: &str) -> anyhow::Result<Option<StoredArticle>> {
        anyhow::bail!("disk I/O error")
    }
}

struct Harness {
    db: Database,
    remote: Arc<ScriptedRemote>,
    network: ManualConnectivity,
    engine: SyncEngine,
}

async fn harness(local: &[Article], remote: Arc<ScriptedRemote>, online: bool) -> Harness {
    let db = Database::open(":memory:").await.unwrap();
    db.upsert_articles(local).await.unwrap();
    let network = ManualConnectivity::new(online);
    let engine = SyncEngine::new(
        Arc::new(db.clone()),
        remote.clone(),
        Arc::new(network.clone()),
        "android",
    );
    Harness {
        db,
        remote,
        network,
        engine,
    }
}

// ============================================================================
// get_articles
// ============================================================================

#[tokio::test]
async fn test_cached_then_merged_emission() {
    let h = harness(
        &[test_article("1", "One", 100), test_article("2", "Two", 200)],
        ScriptedRemote::serving(vec![
            test_article("2", "Two (edited)", 200),
            test_article("3", "Three", 300),
            test_article("4", "Four", 400),
        ]),
        true,
    )
    .await;

    let mut emissions = h.engine.get_articles();

    let cached = emissions.next().await.unwrap().unwrap();
    assert_eq!(ids(&cached), vec!["2", "1"]);
    assert_eq!(h.remote.calls(), 0, "cache must be delivered before any fetch");

    let merged = emissions.next().await.unwrap().unwrap();
    assert_eq!(ids(&merged), vec!["4", "3", "2", "1"]);
    assert_eq!(merged[2].title.as_deref(), Some("Two (edited)"));

    assert!(emissions.next().await.is_none());
}

#[tokio::test]
async fn test_empty_offline_is_single_failure() {
    let h = harness(&[], ScriptedRemote::serving(vec![]), false).await;

    let emissions: Vec<_> = h.engine.get_articles().collect().await;
    assert_eq!(emissions.len(), 1);
    match &emissions[0] {
        Err(e) => assert_eq!(e.to_string(), "no connectivity and no cache"),
        Ok(_) => panic!("expected a failure"),
    }
    assert_eq!(h.remote.calls(), 0);
}

#[tokio::test]
async fn test_empty_online_yields_fetched_only() {
    let h = harness(
        &[],
        ScriptedRemote::serving(vec![test_article("7", "Seven", 700)]),
        true,
    )
    .await;

    let emissions: Vec<_> = h.engine.get_articles().collect().await;
    assert_eq!(emissions.len(), 1);
    assert_eq!(ids(emissions[0].as_ref().unwrap()), vec!["7"]);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let h = harness(
        &[],
        ScriptedRemote::serving(vec![test_article("1", "One", 100)]),
        true,
    )
    .await;

    let emissions = h.engine.get_articles();
    tokio::task::yield_now().await;
    assert_eq!(h.remote.calls(), 0);
    drop(emissions);
    assert!(h.db.get_articles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_broken_store_degrades_to_values() {
    let engine = SyncEngine::new(
        Arc::new(BrokenStore),
        ScriptedRemote::serving(vec![]),
        Arc::new(ManualConnectivity::new(true)),
        "android",
    );

    let emissions: Vec<_> = engine.get_articles().collect().await;
    assert_eq!(emissions.len(), 1);
    assert!(matches!(emissions[0], Err(SyncError::LocalStoreFailed(_))));

    // Observation keeps going with an empty listing
    let mut observed = engine.observe_articles();
    assert_eq!(observed.next().await.unwrap(), Vec::<Article>::new());
    let more = tokio::time::timeout(Duration::from_millis(20), observed.next()).await;
    assert!(more.is_err(), "observation must stay open after a read failure");

    let err = engine.delete_article("1").await.unwrap_err();
    assert!(err.to_string().starts_with("local store failed: "));
    assert!(err.to_string().contains("disk I/O error"));
}

// ============================================================================
// refresh_articles / delete_article
// ============================================================================

#[tokio::test]
async fn test_delete_offline_then_refresh_online_purges() {
    let h = harness(
        &[test_article("42", "Answer", 420), test_article("1", "One", 100)],
        ScriptedRemote::serving(vec![test_article("7", "Seven", 700)]),
        false,
    )
    .await;

    h.engine.delete_article("42").await.unwrap();

    // Passive reads exclude it but do not purge it
    let cached: Vec<_> = h.engine.get_articles().collect().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(ids(cached[0].as_ref().unwrap()), vec!["1"]);
    assert!(h.db.get_article_by_id("42").await.unwrap().unwrap().is_deleted);

    let err = h.engine.refresh_articles().await.unwrap_err();
    assert_eq!(err.to_string(), "no connectivity");
    assert_eq!(h.remote.calls(), 0);
    assert!(h.db.get_article_by_id("42").await.unwrap().is_some());

    h.network.set_available(true);
    let fresh = h.engine.refresh_articles().await.unwrap();
    assert_eq!(ids(&fresh), vec!["7", "1"]);
    assert!(h.db.get_article_by_id("42").await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_failure_leaves_store_untouched() {
    let h = harness(
        &[test_article("1", "One", 100), test_article("2", "Two", 200)],
        ScriptedRemote::failing(500),
        true,
    )
    .await;
    h.engine.delete_article("2").await.unwrap();

    let err = h.engine.refresh_articles().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::RemoteFetchFailed(FetchError::HttpStatus(500))
    ));
    // No purge without a successful fetch
    assert!(h.db.get_article_by_id("2").await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = harness(
        &[test_article("1", "One", 100), test_article("2", "Two", 200)],
        ScriptedRemote::serving(vec![]),
        true,
    )
    .await;

    h.engine.delete_article("1").await.unwrap();
    let once = h.db.get_article_by_id("1").await.unwrap().unwrap();

    h.engine.delete_article("1").await.unwrap();
    h.engine.delete_article("does-not-exist").await.unwrap();

    assert_eq!(h.db.get_article_by_id("1").await.unwrap().unwrap(), once);
    assert_eq!(ids(&h.db.get_articles().await.unwrap()), vec!["2"]);
    assert!(h.db.get_article_by_id("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn test_remote_redelivery_replaces_soft_deleted_article() {
    let h = harness(
        &[test_article("5", "Five", 500)],
        ScriptedRemote::serving(vec![test_article("5", "Five again", 500)]),
        true,
    )
    .await;
    h.engine.delete_article("5").await.unwrap();

    // The cache is empty after the delete, so the fetched list is the only emission
    let emissions: Vec<_> = h.engine.get_articles().collect().await;
    assert_eq!(emissions.len(), 1);
    let listing = emissions[0].as_ref().unwrap();
    assert_eq!(ids(listing), vec!["5"]);
    assert_eq!(listing[0].title.as_deref(), Some("Five again"));

    let stored = h.db.get_article_by_id("5").await.unwrap().unwrap();
    assert!(!stored.is_deleted);

    // Nothing left to purge
    h.engine.refresh_articles().await.unwrap();
    assert!(h.db.get_article_by_id("5").await.unwrap().is_some());
}

// ============================================================================
// End to end over HTTP
// ============================================================================

#[tokio::test]
async fn test_refresh_through_http_client() {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search_by_date"))
        .and(query_param("query", "android"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "hits": [
                    {"objectID": "10", "title": null, "story_title": "Story\nTitle",
                     "author": "dang", "created_at": "2024-05-01T10:00:00.000Z",
                     "created_at_i": 1714557600, "points": null, "story_url": "https://example.com/s"},
                    {"objectID": "11", "title": "Newer", "created_at": "2024-05-02T10:00:00.000Z",
                     "created_at_i": 1714644000, "_tags": ["story"]}
                ],
                "page": 0, "nbPages": 1, "hitsPerPage": 20, "nbHits": 2
            }"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let db = Database::open(":memory:").await.unwrap();
    let client = HnClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let engine = SyncEngine::new(
        Arc::new(db),
        Arc::new(client),
        Arc::new(ManualConnectivity::new(true)),
        "android",
    );

    let fresh = engine.refresh_articles().await.unwrap();
    assert_eq!(ids(&fresh), vec!["11", "10"]);
    assert_eq!(fresh[1].display_title(), "Story Title");
    assert_eq!(fresh[1].display_url(), "https://example.com/s");
    assert_eq!(fresh[0].display_url(), "");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A non-empty cache is always delivered first and no failure ever follows.
    #[test]
    fn prop_non_empty_cache_never_fails(
        local_ids in proptest::collection::btree_set(0u32..1000, 1..8),
        online in any::<bool>(),
        remote_fails in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (first_was_cache, failures) = runtime.block_on(async {
            let local: Vec<Article> = local_ids
                .iter()
                .map(|id| test_article(&id.to_string(), "cached", i64::from(*id)))
                .collect();
            let remote = if remote_fails {
                ScriptedRemote::failing(503)
            } else {
                ScriptedRemote::serving(vec![test_article("9999", "fresh", 9999)])
            };
            let h = harness(&local, remote, online).await;

            let mut emissions = h.engine.get_articles();
            let first = emissions.next().await;
            let first_was_cache = matches!(&first, Some(Ok(list)) if list.len() == local.len())
                && h.remote.calls() == 0;

            let mut failures = 0;
            while let Some(item) = emissions.next().await {
                if item.is_err() {
                    failures += 1;
                }
            }
            (first_was_cache, failures)
        });

        prop_assert!(first_was_cache);
        prop_assert_eq!(failures, 0);
    }
}
