//! TimelineClient — the public face of the fetcher

use chrono::{DateTime, Utc};

use crate::config::FetchConfig;
use crate::error::ApiError;
use crate::http;
use crate::model::{Account, SearchResults, Status};
use crate::session::{self, CrawlOutcome, StatusPage};

/// Client for one Mastodon-compatible instance, optionally authenticated.
///
/// Owns no persisted state; each crawl call runs an independent session
/// and the caller stores the returned cursor and statuses. Calls are
/// strictly sequential within a session: one in-flight request at a time,
/// delays awaited inline. Concurrent sessions for different accounts are
/// safe; sessions sharing one token just hit provider rate limits sooner.
pub struct TimelineClient {
    base_url: String,
    token: Option<String>,
    config: FetchConfig,
}

impl TimelineClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_config(base_url, token, FetchConfig::default())
    }

    pub fn with_config(
        base_url: impl Into<String>,
        token: Option<String>,
        config: FetchConfig,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Check the configured token against the instance.
    ///
    /// Fails with [`ApiError::MissingToken`] when no token is configured;
    /// this endpoint is inherently auth-required. An HTTP 401 here usually
    /// means the caller should forget its stored credentials.
    pub fn verify_credentials(&self) -> Result<Account, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        let url = format!("{}/api/v1/accounts/verify_credentials", self.base_url);
        let body = http::get_with_retry(
            &url,
            &[],
            Some(token),
            self.config.max_retries,
            self.config.base_backoff,
        )?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Resolve a handle (`user` or `user@host`) to an account.
    pub fn lookup_account(&self, handle: &str) -> Result<Account, ApiError> {
        let url = format!("{}/api/v1/accounts/lookup", self.base_url);
        let query = [("acct", handle.to_string())];
        let body = http::get_with_retry(
            &url,
            &query,
            self.token.as_deref(),
            self.config.max_retries,
            self.config.base_backoff,
        )?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch one page of up to `limit` statuses older than `cursor`
    /// (`None` for the newest page).
    ///
    /// Tries authenticated first when a token is configured; a 401/403
    /// re-issues the identical request without credentials and marks the
    /// page `fell_back`. This is the only fallback site, and it runs per
    /// page, so a falling-back session pays the extra round trip on every
    /// page. Any other error propagates unchanged.
    pub fn statuses_page(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<StatusPage, ApiError> {
        let url = format!("{}/api/v1/accounts/{account_id}/statuses", self.base_url);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("max_id", cursor.to_string()));
        }
        let (statuses, fell_back) = with_auth_fallback(self.token.is_some(), |use_auth| {
            let token = if use_auth { self.token.as_deref() } else { None };
            let body = http::get_with_retry(
                &url,
                &query,
                token,
                self.config.max_retries,
                self.config.base_backoff,
            )?;
            Ok(serde_json::from_str::<Vec<Status>>(&body)?)
        })?;
        Ok(StatusPage { statuses, fell_back })
    }

    /// Crawl `account_id`'s timeline backwards until a status older than
    /// `until` is seen, resuming from `cursor` when given.
    ///
    /// `on_progress` receives the cumulative non-reblog count after each
    /// page. Budget exhaustion (time or total-fetch cap) is not an error:
    /// the partial result comes back with `reached_threshold = false`.
    pub fn statuses_until(
        &self,
        account_id: &str,
        until: DateTime<Utc>,
        cursor: Option<&str>,
        on_progress: Option<&mut dyn FnMut(usize)>,
    ) -> Result<CrawlOutcome, ApiError> {
        session::crawl_until(
            &self.config,
            until,
            cursor,
            |cursor| self.statuses_page(account_id, cursor, self.config.page_limit),
            on_progress,
        )
    }

    /// Free-text search scoped to one author: single page, no rate-limit
    /// retry. Query construction is limited to the `from:` author scope.
    pub fn search_statuses(
        &self,
        query: &str,
        author_handle: &str,
        limit: u32,
    ) -> Result<Vec<Status>, ApiError> {
        let url = format!("{}/api/v2/search", self.base_url);
        let params = [
            ("q", format!("{query} from:{author_handle}")),
            ("type", "statuses".to_string()),
            ("resolve", "true".to_string()),
            ("limit", limit.to_string()),
        ];
        let body = http::get_with_retry(
            &url,
            &params,
            self.token.as_deref(),
            0,
            self.config.base_backoff,
        )?;
        let results: SearchResults = serde_json::from_str(&body)?;
        Ok(results.statuses)
    }
}

/// Run `attempt(true)`; on a 401/403 with a token configured, re-run once
/// with `attempt(false)` and report the downgrade in the returned flag.
fn with_auth_fallback<T>(
    has_token: bool,
    mut attempt: impl FnMut(bool) -> Result<T, ApiError>,
) -> Result<(T, bool), ApiError> {
    match attempt(true) {
        Err(e) if has_token && e.is_auth_insufficient() => {
            log::warn!("authorized fetch rejected ({e}), retrying without credentials");
            Ok((attempt(false)?, true))
        }
        Ok(v) => Ok((v, false)),
        Err(e) => Err(e),
    }
}
