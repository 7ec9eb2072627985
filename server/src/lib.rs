//! Wiki Server - HTTP API over the page history tracker.
//!
//! This crate provides the server component of the wiki history tracker,
//! responsible for:
//! - Serving page histories that follow pages across renames
//! - Accepting on-demand scan requests
//! - Running the background recorder and filesystem watcher
//!
//! # Architecture
//!
//! The server owns one [`wiki_history::store::HistoryStore`] shared between
//! the request handlers and the background recorder. Handlers never run a
//! reconciliation pass themselves; they only ask the recorder for one.

pub mod config;
pub mod error;
pub mod routes;
