//! Wire models for the Mastodon-compatible REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One status (post) as returned by the statuses and search endpoints.
///
/// Immutable once fetched. Only the fields the fetcher and its callers read
/// are modeled; everything else in the wire object is ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Raw reblogged status object; `null`/absent for original posts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_account_id: Option<String>,
    /// HTML body, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Status {
    /// Reblogs count toward fetch budgets but are excluded from results.
    pub fn is_reblog(&self) -> bool {
        self.reblog.as_ref().is_some_and(|v| !v.is_null())
    }
}

/// Account as returned by verify_credentials and lookup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    pub acct: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
}

/// Body of `/api/v2/search` — only the statuses bucket is consumed.
#[derive(Debug, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub statuses: Vec<Status>,
}
