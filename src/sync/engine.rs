use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

use super::error::{SyncError, SyncResult};
use crate::connectivity::Connectivity;
use crate::remote::RemoteSource;
use crate::storage::{Article, ArticleStore, StoredArticle};

/// Everything the presentation layer may ask of the article data.
///
/// [`SyncEngine`] is the production implementation; tests inject fakes.
#[async_trait]
pub trait ArticlesRepository: Send + Sync {
    /// Offline-first read: cached articles first (if any), then the
    /// refreshed listing (if the network allows). See [`SyncEngine::get_articles`].
    fn get_articles(&self) -> BoxStream<'static, SyncResult<Vec<Article>>>;

    /// Live listing of non-deleted articles, newest first. Never fails and
    /// never ends on its own.
    fn observe_articles(&self) -> BoxStream<'static, Vec<Article>>;

    /// User-triggered refresh: fetch, store, purge soft-deleted rows.
    async fn refresh_articles(&self) -> SyncResult<Vec<Article>>;

    /// Soft-delete; unknown or already-deleted IDs are a no-op.
    async fn delete_article(&self, object_id: &str) -> SyncResult<()>;

    /// Single article by ID, soft-deleted ones included.
    async fn get_article(&self, object_id: &str) -> SyncResult<Option<StoredArticle>>;
}

/// Offline-first synchronization over a local store, a remote source and a
/// connectivity signal.
///
/// The local store is the only thing the UI observes: remote results are
/// always written there first and re-read before being returned.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn ArticleStore>,
    remote: Arc<dyn RemoteSource>,
    connectivity: Arc<dyn Connectivity>,
    query: Arc<str>,
}

/// Position of a `get_articles()` stream.
enum ReadStep {
    Local,
    Remote { had_local: bool },
    Done,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        remote: Arc<dyn RemoteSource>,
        connectivity: Arc<dyn Connectivity>,
        query: &str,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            query: Arc::from(query),
        }
    }

    /// Fetch, write through the store, re-read.
    async fn fetch_into_store(&self) -> SyncResult<Vec<Article>> {
        let fetched = self.remote.fetch_articles(&self.query).await?;
        self.store
            .upsert_batch(&fetched)
            .await
            .map_err(SyncError::LocalStoreFailed)?;
        tracing::debug!(fetched = fetched.len(), query = %self.query, "Stored remote articles");
        self.store
            .query_all()
            .await
            .map_err(SyncError::LocalStoreFailed)
    }

    async fn step(&self, mut step: ReadStep) -> Option<(SyncResult<Vec<Article>>, ReadStep)> {
        loop {
            match step {
                ReadStep::Done => return None,
                ReadStep::Local => match self.store.query_all().await {
                    Ok(local) if !local.is_empty() => {
                        tracing::debug!(count = local.len(), "Serving cached articles");
                        return Some((Ok(local), ReadStep::Remote { had_local: true }));
                    }
                    Ok(_) => step = ReadStep::Remote { had_local: false },
                    Err(e) => {
                        return Some((Err(SyncError::LocalStoreFailed(e)), ReadStep::Done));
                    }
                },
                ReadStep::Remote { had_local } => {
                    if !self.connectivity.is_available().await {
                        if had_local {
                            tracing::debug!("Offline, cached articles stand");
                            return None;
                        }
                        return Some((
                            Err(SyncError::NoConnectivity { cache_empty: true }),
                            ReadStep::Done,
                        ));
                    }

                    return match self.fetch_into_store().await {
                        Ok(fresh) => Some((Ok(fresh), ReadStep::Done)),
                        Err(e) if had_local => {
                            tracing::warn!(error = %e, "Background fetch failed, keeping cached articles");
                            None
                        }
                        Err(e) => Some((Err(e), ReadStep::Done)),
                    };
                }
            }
        }
    }
}

#[async_trait]
impl ArticlesRepository for SyncEngine {
    /// Emits, in this order and at most once each:
    ///
    /// 1. the cached listing, if it is non-empty (before any network activity);
    /// 2. the listing re-read after a successful fetch, if online;
    /// 3. a failure, only when nothing was emitted in step 1.
    ///
    /// The stream is lazy; nothing runs until it is polled.
    fn get_articles(&self) -> BoxStream<'static, SyncResult<Vec<Article>>> {
        stream::unfold(
            (self.clone(), ReadStep::Local),
            |(engine, step)| async move {
                let (item, next) = engine.step(step).await?;
                Some((item, (engine, next)))
            },
        )
        .boxed()
    }

    /// Store read failures degrade to an empty listing; observation goes on.
    fn observe_articles(&self) -> BoxStream<'static, Vec<Article>> {
        self.store
            .observe()
            .map(|listing| match listing {
                Ok(articles) => articles,
                Err(e) => {
                    tracing::warn!(error = %e, "Article observation read failed, emitting empty list");
                    Vec::new()
                }
            })
            .boxed()
    }

    async fn refresh_articles(&self) -> SyncResult<Vec<Article>> {
        if !self.connectivity.is_available().await {
            return Err(SyncError::NoConnectivity { cache_empty: false });
        }

        let fetched = self.remote.fetch_articles(&self.query).await?;
        self.store
            .upsert_batch(&fetched)
            .await
            .map_err(SyncError::LocalStoreFailed)?;
        // The only place soft-deleted rows are physically removed.
        let purged = self
            .store
            .purge_deleted()
            .await
            .map_err(SyncError::LocalStoreFailed)?;
        let fresh = self
            .store
            .query_all()
            .await
            .map_err(SyncError::LocalStoreFailed)?;

        tracing::info!(
            fetched = fetched.len(),
            purged,
            articles = fresh.len(),
            "Refresh complete"
        );
        Ok(fresh)
    }

    async fn delete_article(&self, object_id: &str) -> SyncResult<()> {
        self.store
            .soft_delete(object_id)
            .await
            .map_err(SyncError::LocalStoreFailed)
    }

    async fn get_article(&self, object_id: &str) -> SyncResult<Option<StoredArticle>> {
        self.store
            .get_by_id(object_id)
            .await
            .map_err(SyncError::LocalStoreFailed)
    }
}
