//! tootline — incremental timeline fetcher for Mastodon-compatible servers
//!
//! Crawls an account's statuses backwards through time one page at a time,
//! handling rate-limit retries, permission fallback to public access, and
//! time/volume budgets. The caller owns persistence: it stores the cursor
//! and the accumulated posts between invocations and feeds the cursor back
//! in to resume.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod session;

// Re-exports for convenience
pub use client::TimelineClient;
pub use config::FetchConfig;
pub use error::ApiError;
pub use model::{Account, SearchResults, Status};
pub use session::{CrawlOutcome, StatusPage};
