//! The local-store contract the sync engine depends on.
//!
//! [`Database`] is the production implementation; tests substitute their
//! own stores to inject faults.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::schema::Database;
use super::types::{Article, StoredArticle};

/// Durable keyed storage of articles.
///
/// Every write is atomic per call and may interleave freely with ongoing
/// observation.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Snapshot of the non-deleted articles, newest first.
    async fn query_all(&self) -> Result<Vec<Article>>;

    /// Live listing: the current snapshot, then one per committed change.
    fn observe(&self) -> BoxStream<'static, Result<Vec<Article>>>;

    /// Replace-on-conflict write of a whole batch.
    async fn upsert_batch(&self, articles: &[Article]) -> Result<()>;

    /// Hide an article. Unknown or already-deleted IDs are a no-op.
    async fn soft_delete(&self, object_id: &str) -> Result<()>;

    /// Physically remove everything soft-deleted, returning the count.
    async fn purge_deleted(&self) -> Result<u64>;

    /// Lookup that also sees soft-deleted rows.
    async fn get_by_id(&self, object_id: &str) -> Result<Option<StoredArticle>>;
}

#[async_trait]
impl ArticleStore for Database {
    async fn query_all(&self) -> Result<Vec<Article>> {
        self.get_articles().await
    }

    fn observe(&self) -> BoxStream<'static, Result<Vec<Article>>> {
        self.observe_articles()
    }

    async fn upsert_batch(&self, articles: &[Article]) -> Result<()> {
        self.upsert_articles(articles).await.map(|_| ())
    }

    async fn soft_delete(&self, object_id: &str) -> Result<()> {
        let changed = self.soft_delete_article(object_id).await?;
        if !changed {
            tracing::debug!(object_id, "Soft delete was a no-op");
        }
        Ok(())
    }

    async fn purge_deleted(&self) -> Result<u64> {
        self.purge_deleted_articles().await
    }

    async fn get_by_id(&self, object_id: &str) -> Result<Option<StoredArticle>> {
        self.get_article_by_id(object_id).await
    }
}
