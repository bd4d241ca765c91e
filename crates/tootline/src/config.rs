//! Crawl policy configuration

use std::time::Duration;

/// Knobs for one timeline crawl.
///
/// One coherent policy for the whole fetcher; callers override fields as
/// needed before constructing a [`TimelineClient`](crate::TimelineClient).
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Additional attempts after a 429 before surfacing it as a failure
    pub max_retries: u32,
    /// First backoff wait when the response carries no Retry-After header;
    /// doubles per retry
    pub base_backoff: Duration,
    /// Posts requested per page (the server caps this at 40)
    pub page_limit: u32,
    /// Hard cap on total posts fetched in one crawl, reblogs included
    pub total_fetch_cap: usize,
    /// Wall-clock budget for one crawl; exceeding it truncates gracefully
    pub time_budget: Duration,
    /// Inter-page delay is drawn uniformly from `jitter_min..=jitter_max`
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_secs(1),
            page_limit: 40,
            total_fetch_cap: 4000,
            time_budget: Duration::from_secs(90),
            jitter_min: Duration::from_millis(400),
            jitter_max: Duration::from_millis(900),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_coherent() {
        let cfg = FetchConfig::default();
        assert!(cfg.jitter_min <= cfg.jitter_max);
        assert!(cfg.page_limit > 0);
        assert!(cfg.total_fetch_cap >= cfg.page_limit as usize);
    }
}
