use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of hn-reader appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as
/// one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// Fallback shown when an article has neither a title nor a story title.
pub const UNTITLED: &str = "Untitled";

/// A news item as the rest of the application sees it.
///
/// `object_id` is the identity and the merge key: writing an article whose
/// ID already exists replaces the stored one. `created_at_i` (epoch seconds)
/// is the only sort key, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub object_id: String,
    pub title: Option<String>,
    pub story_title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub story_url: Option<String>,
    pub comment_text: Option<String>,
    /// Human-readable creation date as delivered by the API.
    pub created_at: String,
    pub created_at_i: i64,
    pub points: Option<i64>,
}

impl Article {
    /// Title, else story title, else [`UNTITLED`].
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.story_title.as_deref())
            .unwrap_or(UNTITLED)
    }

    /// URL, else story URL, else the empty string.
    pub fn display_url(&self) -> &str {
        self.url
            .as_deref()
            .or(self.story_url.as_deref())
            .unwrap_or("")
    }
}

/// An article together with its local-only bookkeeping columns.
///
/// Only [`Database::get_article_by_id`](super::Database::get_article_by_id)
/// returns these, since it is the one query that also sees soft-deleted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub article: Article,
    pub is_deleted: bool,
    /// Epoch seconds of the last write to this row.
    pub last_updated: i64,
}

/// Internal row type for article queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub object_id: String,
    pub title: Option<String>,
    pub story_title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub story_url: Option<String>,
    pub comment_text: Option<String>,
    pub created_at: String,
    pub created_at_i: i64,
    pub points: Option<i64>,
    pub is_deleted: bool,
    pub last_updated: i64,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Article {
        self.into_stored().article
    }

    pub(crate) fn into_stored(self) -> StoredArticle {
        StoredArticle {
            article: Article {
                object_id: self.object_id,
                title: self.title,
                story_title: self.story_title,
                author: self.author,
                url: self.url,
                story_url: self.story_url,
                comment_text: self.comment_text,
                created_at: self.created_at,
                created_at_i: self.created_at_i,
                points: self.points,
            },
            is_deleted: self.is_deleted,
            last_updated: self.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn article(title: Option<&str>, story_title: Option<&str>) -> Article {
        Article {
            object_id: "1".to_string(),
            title: title.map(str::to_string),
            story_title: story_title.map(str::to_string),
            author: None,
            url: None,
            story_url: None,
            comment_text: None,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            created_at_i: 1704067200,
            points: None,
        }
    }

    #[test]
    fn test_display_title_prefers_title() {
        assert_eq!(article(Some("A"), Some("B")).display_title(), "A");
        assert_eq!(article(None, Some("B")).display_title(), "B");
        assert_eq!(article(None, None).display_title(), UNTITLED);
    }

    #[test]
    fn test_display_url_falls_back_to_empty() {
        let mut a = article(None, None);
        assert_eq!(a.display_url(), "");
        a.story_url = Some("https://story.example.com".into());
        assert_eq!(a.display_url(), "https://story.example.com");
        a.url = Some("https://example.com".into());
        assert_eq!(a.display_url(), "https://example.com");
    }

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("SQLITE_BUSY"));
        assert!(!is_lock_message("no such table: articles"));
    }

    proptest! {
        #[test]
        fn prop_display_title_never_empty_when_sources_missing(
            title in proptest::option::of("[a-z]{1,12}"),
            story in proptest::option::of("[a-z]{1,12}"),
        ) {
            let a = article(title.as_deref(), story.as_deref());
            let expected = title.clone().or(story.clone()).unwrap_or_else(|| UNTITLED.to_string());
            prop_assert_eq!(a.display_title(), expected.as_str());
        }
    }
}
