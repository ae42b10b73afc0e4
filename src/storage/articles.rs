use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Article, ArticleDbRow, StoredArticle};

/// 11 bound columns * 50 rows = 550, well under SQLite's 999 parameter limit.
const BATCH_SIZE: usize = 50;

impl Database {
    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Insert or replace a batch of articles, keyed by `object_id`.
    ///
    /// The whole batch lands in one transaction. A colliding ID replaces the
    /// stored row outright: every remote field is overwritten, `last_updated`
    /// is reset and `is_deleted` goes back to 0, so a re-delivered article
    /// becomes visible again. Duplicate IDs inside one batch resolve
    /// last-writer-wins.
    ///
    /// Returns the number of rows written.
    pub async fn upsert_articles(&self, articles: &[Article]) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut written: usize = 0;

        for chunk in articles.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO articles (object_id, title, story_title, author, url, story_url, \
                 comment_text, created_at, created_at_i, points, last_updated) ",
            );

            builder.push_values(chunk, |mut b, article| {
                b.push_bind(&article.object_id)
                    .push_bind(&article.title)
                    .push_bind(&article.story_title)
                    .push_bind(&article.author)
                    .push_bind(&article.url)
                    .push_bind(&article.story_url)
                    .push_bind(&article.comment_text)
                    .push_bind(&article.created_at)
                    .push_bind(article.created_at_i)
                    .push_bind(article.points)
                    .push_bind(now);
            });

            builder.push(
                " ON CONFLICT(object_id) DO UPDATE SET \
                 title = excluded.title, \
                 story_title = excluded.story_title, \
                 author = excluded.author, \
                 url = excluded.url, \
                 story_url = excluded.story_url, \
                 comment_text = excluded.comment_text, \
                 created_at = excluded.created_at, \
                 created_at_i = excluded.created_at_i, \
                 points = excluded.points, \
                 is_deleted = 0, \
                 last_updated = excluded.last_updated",
            );

            let result = builder.build().execute(&mut *tx).await?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        tracing::debug!(count = articles.len(), written, "Upserted article batch");
        self.notify_changed();
        Ok(written)
    }

    /// Mark an article as deleted without removing it.
    ///
    /// Idempotent: an unknown or already-deleted ID changes nothing and
    /// returns `false`.
    pub async fn soft_delete_article(&self, object_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET is_deleted = 1 WHERE object_id = ? AND is_deleted = 0",
        )
        .bind(object_id)
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.notify_changed();
        }
        Ok(changed)
    }

    /// Physically remove every soft-deleted row, returning how many went.
    pub async fn purge_deleted_articles(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM articles WHERE is_deleted = 1")
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Purged soft-deleted articles");
            self.notify_changed();
        }
        Ok(purged)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// All articles that are not soft-deleted, newest first.
    pub async fn get_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleDbRow>(
            r#"
            SELECT object_id, title, story_title, author, url, story_url, comment_text,
                   created_at, created_at_i, points, is_deleted, last_updated
            FROM articles
            WHERE is_deleted = 0
            ORDER BY created_at_i DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    /// Look up a single article by ID, including soft-deleted ones.
    pub async fn get_article_by_id(&self, object_id: &str) -> Result<Option<StoredArticle>> {
        let row = sqlx::query_as::<_, ArticleDbRow>(
            r#"
            SELECT object_id, title, story_title, author, url, story_url, comment_text,
                   created_at, created_at_i, points, is_deleted, last_updated
            FROM articles
            WHERE object_id = ?
        "#,
        )
        .bind(object_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleDbRow::into_stored))
    }

    /// Live view of [`get_articles`](Self::get_articles).
    ///
    /// Yields the current listing right away, then a fresh listing after
    /// every committed change. Changes that land while a read is running
    /// are coalesced into one follow-up read. The stream never ends on its
    /// own; drop it to unsubscribe.
    pub fn observe_articles(&self) -> BoxStream<'static, Result<Vec<Article>>> {
        let mut changes = self.changes.subscribe();
        changes.borrow_and_update();

        stream::unfold(
            (self.clone(), changes, true),
            |(db, mut changes, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                changes.borrow_and_update();
                let listing = db.get_articles().await;
                Some((listing, (db, changes, false)))
            },
        )
        .boxed()
    }
}
