//! Presentation state for the article list.
//!
//! [`ArticlesReducer`] decides, [`spawn`] runs it: one actor task per list,
//! publishing [`DisplayState`] snapshots through a `watch` channel.

mod reducer;
mod runtime;
mod state;

pub use reducer::{
    ArticlesReducer, Effect, ERROR_NO_CONNECTION, ERROR_NO_CONNECTION_REFRESH,
    ERROR_REFRESH_DISABLED,
};
pub use runtime::{spawn, PresenterHandle};
pub use state::{DisplayState, SyncState};
