//! Background policy persistence and session statistics for Brood.
//!
//! - [`PersistenceService`] writes policy documents and session logs on
//!   a dedicated worker thread, retrying transient I/O failures with a
//!   short backoff. Submitting never blocks the tick loop.
//! - [`store`] holds the synchronous helpers: atomic temp-file-and-rename
//!   writes and loads that treat a missing or unreadable file as a cold
//!   start.
//! - [`SessionLog`] records completed episodes and compacts the oldest
//!   into aggregate buckets.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod store;

pub use config::PersistConfig;
pub use error::PersistError;
pub use service::{PersistStats, PersistenceService};
pub use session::{EpisodeBucket, EpisodeRecord, SessionLog, Summary};
