//! Offline-first Hacker News reader.
//!
//! Articles from the HN Algolia search API are cached in SQLite and served
//! from there first; the network only refreshes what the cache holds.

pub mod config;
pub mod connectivity;
pub mod presenter;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod util;
