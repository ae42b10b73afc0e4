use std::sync::Arc;

use crate::storage::Article;

/// Immutable snapshot of what the article list should show.
///
/// Published whole on every change; consumers never see a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Shared so that publishing a snapshot does not copy the list.
    pub articles: Arc<Vec<Article>>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<String>,
    /// False when the process started without a network; refresh stays
    /// disabled for the rest of its lifetime.
    pub has_initial_connectivity: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            articles: Arc::new(Vec::new()),
            is_loading: false,
            is_refreshing: false,
            error: None,
            has_initial_connectivity: true,
        }
    }
}

impl DisplayState {
    pub fn has_articles(&self) -> bool {
        !self.articles.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn allow_refresh(&self) -> bool {
        self.has_initial_connectivity
    }
}

/// Bookkeeping behind the display state that the UI does not render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub is_offline: bool,
    /// One-way latch, set at start-up only.
    pub started_offline: bool,
    /// Message of the most recent engine failure, shown or not.
    pub last_error: Option<String>,
}
