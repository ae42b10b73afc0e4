//! The article-list state machine.
//!
//! Pure and synchronous: every input mutates the state in place and may
//! return an [`Effect`] for the runtime to perform. Nothing here touches the
//! network, the store or the clock, so every transition is testable on its own.

use std::sync::Arc;

use super::state::{DisplayState, SyncState};
use crate::connectivity::ConnectionState;
use crate::storage::Article;
use crate::sync::{SyncError, SyncResult};

pub const ERROR_NO_CONNECTION: &str = "No connection, showing local data";
pub const ERROR_REFRESH_DISABLED: &str = "Refresh disabled: app started without a connection";
pub const ERROR_NO_CONNECTION_REFRESH: &str = "No connection to refresh";

/// Messages containing this are treated as connectivity-related.
const CONNECTIVITY_KEYWORD: &str = "connect";

/// Work the runtime must start on the reducer's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run `get_articles()` and feed every emission back.
    Load,
    /// Run `refresh_articles()` and feed the outcome back.
    Refresh,
    /// Soft-delete the article.
    Delete(String),
}

fn mentions_connectivity(message: &str) -> bool {
    message.to_lowercase().contains(CONNECTIVITY_KEYWORD)
}

/// Only network-side failures qualify; a store error mentioning a pool
/// connection is still a store error.
fn is_connectivity_error(error: &SyncError) -> bool {
    match error {
        SyncError::NoConnectivity { .. } | SyncError::RemoteFetchFailed(_) => {
            error.is_connectivity() || mentions_connectivity(&error.to_string())
        }
        SyncError::LocalStoreFailed(_) | SyncError::Unknown(_) => false,
    }
}

#[derive(Debug, Default)]
pub struct ArticlesReducer {
    display: DisplayState,
    sync: SyncState,
}

impl ArticlesReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    /// One-time start-up with the result of the initial connectivity check.
    ///
    /// Starting offline sets the sticky latch; nothing ever clears it.
    pub fn on_start(&mut self, connected: bool) -> Effect {
        self.sync.is_offline = !connected;
        if connected {
            self.display.has_initial_connectivity = true;
        } else {
            tracing::debug!("Started without a connection, refresh disabled for this session");
            self.sync.started_offline = true;
            self.display.has_initial_connectivity = false;
            self.display.error = Some(ERROR_NO_CONNECTION.to_string());
        }
        Effect::Load
    }

    /// A connectivity transition. Going offline only flips the flag; the
    /// user hears about it when they try to refresh.
    pub fn on_connectivity(&mut self, state: ConnectionState) -> Option<Effect> {
        let was_offline = self.sync.is_offline;
        let is_offline = !state.is_available();
        self.sync.is_offline = is_offline;

        if !(was_offline && !is_offline) {
            return None;
        }

        tracing::debug!(started_offline = self.sync.started_offline, "Connection restored");
        if self
            .display
            .error
            .as_deref()
            .is_some_and(mentions_connectivity)
        {
            self.display.error = None;
        }

        if !self.sync.started_offline && self.display.has_articles() {
            return self.request_refresh();
        }
        None
    }

    /// The local store changed. Empty listings are ignored.
    pub fn on_local_articles(&mut self, articles: Vec<Article>) {
        if articles.is_empty() {
            return;
        }
        self.display.articles = Arc::new(articles);
        self.display.is_loading = false;
    }

    /// A load is about to start. The spinner only shows for a cold, online start.
    pub fn on_load_started(&mut self) {
        if !self.display.has_articles() && !self.sync.is_offline {
            self.display.is_loading = true;
            self.display.error = None;
        }
    }

    /// One emission of `get_articles()`.
    pub fn on_load_result(&mut self, result: SyncResult<Vec<Article>>) {
        match result {
            Ok(articles) => {
                self.display.articles = Arc::new(articles);
                self.display.is_loading = false;
                self.display.is_refreshing = false;
                self.display.error = None;
            }
            Err(e) => self.on_error(e),
        }
    }

    /// Shows the error unless a populated list would be covered by a
    /// transient failure.
    pub fn on_error(&mut self, error: SyncError) {
        let message = error.to_string();
        self.sync.last_error = Some(message.clone());
        self.display.is_loading = false;
        self.display.is_refreshing = false;

        let show = !self.display.has_articles()
            || (is_connectivity_error(&error) && self.sync.is_offline);
        if show {
            self.display.error = Some(message);
        } else {
            tracing::warn!(error = %message, "Suppressed error over cached articles");
        }
    }

    /// The user asked for a refresh.
    pub fn request_refresh(&mut self) -> Option<Effect> {
        if self.sync.started_offline {
            self.display.is_refreshing = false;
            self.display.error = Some(ERROR_REFRESH_DISABLED.to_string());
            return None;
        }
        if self.sync.is_offline {
            self.display.is_refreshing = false;
            self.display.error = Some(ERROR_NO_CONNECTION_REFRESH.to_string());
            return None;
        }
        self.display.is_refreshing = true;
        self.display.error = None;
        Some(Effect::Refresh)
    }

    /// Outcome of a refresh. Articles arrive through the store observation,
    /// not from here.
    pub fn on_refresh_result(&mut self, result: SyncResult<Vec<Article>>) {
        self.display.is_refreshing = false;
        match result {
            Ok(_) => self.display.error = None,
            Err(e) => {
                let message = if is_connectivity_error(&e) {
                    ERROR_NO_CONNECTION_REFRESH.to_string()
                } else {
                    e.to_string()
                };
                self.sync.last_error = Some(e.to_string());
                self.display.error = Some(message);
            }
        }
    }

    /// The user deleted an article. The list itself changes once the store
    /// observation reports the removal.
    pub fn request_delete(&mut self, object_id: &str) -> Effect {
        Effect::Delete(object_id.to_string())
    }

    pub fn on_delete_result(&mut self, result: SyncResult<()>) {
        if let Err(e) = result {
            self.on_error(e);
        }
    }
}
