//! Incremental crawl: per-call session state and the bounded page loop

use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::FetchConfig;
use crate::error::ApiError;
use crate::model::Status;

/// Result of fetching one page, with the fallback marker for that page.
#[derive(Debug)]
pub struct StatusPage {
    /// Newest-first, length ≤ the requested limit
    pub statuses: Vec<Status>,
    /// True when this page was served via the public-access fallback
    pub fell_back: bool,
}

/// What one crawl invocation hands back to the caller.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Non-reblog statuses in fetch order (newest first)
    pub statuses: Vec<Status>,
    /// Id of the oldest status seen; feed back in to resume the crawl
    pub last_cursor: Option<String>,
    /// A status strictly older than the threshold date was observed
    pub reached_threshold: bool,
    /// At least one page required the public-access fallback
    pub fell_back: bool,
}

/// Transient per-call crawl state. Created fresh for every invocation;
/// nothing is shared across sessions.
struct FetchSession {
    statuses: Vec<Status>,
    cursor: Option<String>,
    /// Total statuses fetched, reblogs included
    fetched_total: usize,
    reached_threshold: bool,
    /// Monotone: never reverts to false within a session
    fell_back: bool,
    started: Instant,
}

impl FetchSession {
    fn new(start_cursor: Option<&str>) -> Self {
        Self {
            statuses: Vec::new(),
            cursor: start_cursor.map(String::from),
            fetched_total: 0,
            reached_threshold: false,
            fell_back: false,
            started: Instant::now(),
        }
    }

    fn into_outcome(self) -> CrawlOutcome {
        CrawlOutcome {
            statuses: self.statuses,
            last_cursor: self.cursor,
            reached_threshold: self.reached_threshold,
            fell_back: self.fell_back,
        }
    }
}

/// Crawl pages of one account's timeline until a status older than `until`
/// is seen, or a budget runs out, or the timeline ends.
///
/// `fetch_page` is called with the current cursor (`None` for the first
/// page) and returns one newest-first page. Any error it returns aborts
/// the whole crawl; budget exhaustion instead returns partial results
/// with `reached_threshold = false`.
///
/// Strictly sequential: the next fetch is never issued before the jitter
/// delay following the previous one has elapsed.
pub(crate) fn crawl_until(
    config: &FetchConfig,
    until: DateTime<Utc>,
    start_cursor: Option<&str>,
    mut fetch_page: impl FnMut(Option<&str>) -> Result<StatusPage, ApiError>,
    mut on_progress: Option<&mut dyn FnMut(usize)>,
) -> Result<CrawlOutcome, ApiError> {
    let mut session = FetchSession::new(start_cursor);
    loop {
        if session.started.elapsed() > config.time_budget {
            log::debug!(
                "time budget {:?} exhausted after {} statuses",
                config.time_budget,
                session.fetched_total
            );
            break;
        }

        let page = fetch_page(session.cursor.as_deref())?;
        session.fell_back |= page.fell_back;

        let Some(oldest) = page.statuses.last() else {
            log::debug!("empty page, timeline exhausted");
            break;
        };
        let page_len = page.statuses.len();
        let oldest_at = oldest.created_at;
        session.cursor = Some(oldest.id.clone());
        session.fetched_total += page_len;
        session
            .statuses
            .extend(page.statuses.into_iter().filter(|s| !s.is_reblog()));

        if oldest_at < until {
            session.reached_threshold = true;
        }
        if let Some(cb) = on_progress.as_mut() {
            cb(session.statuses.len());
        }

        if session.reached_threshold {
            log::debug!("threshold reached at {oldest_at}");
            break;
        }
        if page_len < config.page_limit as usize {
            log::debug!("undersized page ({page_len} < {}), timeline exhausted", config.page_limit);
            break;
        }
        if session.fetched_total > config.total_fetch_cap {
            log::debug!("fetch cap {} exceeded, stopping", config.total_fetch_cap);
            break;
        }

        sleep_jitter(config);
    }
    Ok(session.into_outcome())
}

/// Randomized inter-page delay, to avoid bursting the remote service
fn sleep_jitter(config: &FetchConfig) {
    if config.jitter_max.is_zero() {
        return;
    }
    let min = config.jitter_min.min(config.jitter_max).as_millis() as u64;
    let max = config.jitter_max.as_millis() as u64;
    let wait = rand::rng().random_range(min..=max);
    std::thread::sleep(std::time::Duration::from_millis(wait));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_config() -> FetchConfig {
        FetchConfig {
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            ..FetchConfig::default()
        }
    }

    fn date(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn status(id: &str, created_at: &str, reblog: bool) -> Status {
        Status {
            id: id.to_string(),
            created_at: date(created_at),
            reblog: reblog.then(|| serde_json::json!({"id": "0"})),
            in_reply_to_account_id: None,
            content: None,
        }
    }

    /// `count` statuses, ids descending from `first_id`, one minute apart
    /// starting at `newest`
    fn page_of(count: usize, first_id: u64, newest: &str) -> Vec<Status> {
        let start = date(newest);
        (0..count)
            .map(|i| {
                let at = start - chrono::Duration::minutes(i as i64);
                status(&(first_id - i as u64).to_string(), &at.to_rfc3339(), false)
            })
            .collect()
    }

    fn page(statuses: Vec<Status>) -> Result<StatusPage, ApiError> {
        Ok(StatusPage {
            statuses,
            fell_back: false,
        })
    }

    #[test]
    fn empty_first_page() {
        let cfg = test_config();
        let mut calls = 0;
        let outcome = crawl_until(
            &cfg,
            date("2023-01-01T00:00:00Z"),
            None,
            |_| {
                calls += 1;
                page(vec![])
            },
            None,
        )
        .unwrap();
        assert_eq!(calls, 1);
        assert!(outcome.statuses.is_empty());
        assert_eq!(outcome.last_cursor, None);
        assert!(!outcome.reached_threshold);
        assert!(!outcome.fell_back);
    }

    #[test]
    fn reblogs_filtered_order_preserved() {
        let cfg = test_config();
        let outcome = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |_| {
                page(vec![
                    status("5", "2023-06-01T00:05:00Z", false),
                    status("4", "2023-06-01T00:04:00Z", true),
                    status("3", "2023-06-01T00:03:00Z", false),
                    status("2", "2023-06-01T00:02:00Z", true),
                    status("1", "2023-06-01T00:01:00Z", false),
                ])
            },
            None,
        )
        .unwrap();
        let ids: Vec<&str> = outcome.statuses.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["5", "3", "1"]);
        // reblogs still move the cursor and count toward the budget
        assert_eq!(outcome.last_cursor.as_deref(), Some("1"));
    }

    #[test]
    fn cursor_advances_through_pages() {
        let cfg = test_config();
        let mut cursors_seen: Vec<Option<String>> = Vec::new();
        let mut call = 0;
        let outcome = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |cursor| {
                cursors_seen.push(cursor.map(String::from));
                call += 1;
                match call {
                    1 => page(page_of(40, 200, "2023-06-01T00:00:00Z")),
                    _ => page(page_of(3, 160, "2023-05-01T00:00:00Z")),
                }
            },
            None,
        )
        .unwrap();
        assert_eq!(cursors_seen, [None, Some("161".to_string())]);
        assert_eq!(outcome.last_cursor.as_deref(), Some("158"));
        assert!(!outcome.reached_threshold);
    }

    #[test]
    fn start_cursor_passed_to_first_fetch() {
        let cfg = test_config();
        let mut first = None;
        let outcome = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            Some("500"),
            |cursor| {
                first = cursor.map(String::from);
                page(vec![])
            },
            None,
        )
        .unwrap();
        assert_eq!(first.as_deref(), Some("500"));
        // empty page leaves the resume cursor untouched
        assert_eq!(outcome.last_cursor.as_deref(), Some("500"));
    }

    #[test]
    fn three_full_pages_to_threshold() {
        // Spec'd example: until 2023-01-01, three pages of 40, third page's
        // oldest dated 2022-12-15
        let cfg = test_config();
        let mut call = 0;
        let outcome = crawl_until(
            &cfg,
            date("2023-01-01T00:00:00Z"),
            None,
            |_| {
                call += 1;
                match call {
                    1 => page(page_of(40, 300, "2023-03-01T00:00:00Z")),
                    2 => page(page_of(40, 260, "2023-02-01T00:00:00Z")),
                    3 => {
                        let mut p = page_of(39, 220, "2023-01-02T00:00:00Z");
                        p.push(status("181", "2022-12-15T00:00:00Z", false));
                        page(p)
                    }
                    _ => panic!("crawl did not stop at the threshold"),
                }
            },
            None,
        )
        .unwrap();
        assert_eq!(call, 3);
        assert!(outcome.reached_threshold);
        assert_eq!(outcome.statuses.len(), 120);
        assert_eq!(outcome.last_cursor.as_deref(), Some("181"));
        // fetch order preserved across pages
        assert_eq!(outcome.statuses.first().map(|s| s.id.as_str()), Some("300"));
        assert_eq!(outcome.statuses.last().map(|s| s.id.as_str()), Some("181"));
    }

    #[test]
    fn threshold_on_first_page_costs_one_fetch() {
        let cfg = test_config();
        let mut calls = 0;
        let outcome = crawl_until(
            &cfg,
            date("2024-01-01T00:00:00Z"),
            None,
            |_| {
                calls += 1;
                page(page_of(40, 100, "2023-06-01T00:00:00Z"))
            },
            None,
        )
        .unwrap();
        assert_eq!(calls, 1);
        assert!(outcome.reached_threshold);
    }

    #[test]
    fn undersized_page_stops_before_threshold() {
        let cfg = test_config();
        let mut calls = 0;
        let outcome = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |_| {
                calls += 1;
                page(page_of(7, 100, "2023-06-01T00:00:00Z"))
            },
            None,
        )
        .unwrap();
        assert_eq!(calls, 1);
        assert!(!outcome.reached_threshold);
        assert_eq!(outcome.statuses.len(), 7);
    }

    #[test]
    fn fetch_cap_stops_crawl() {
        let mut cfg = test_config();
        cfg.total_fetch_cap = 75;
        let mut call = 0u64;
        let outcome = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |_| {
                call += 1;
                page(page_of(40, 1000 - 40 * (call - 1), "2023-06-01T00:00:00Z"))
            },
            None,
        )
        .unwrap();
        // 40 after page 1 (≤ cap), 80 after page 2 (> cap)
        assert_eq!(call, 2);
        assert!(!outcome.reached_threshold);
        assert_eq!(outcome.statuses.len(), 80);
    }

    #[test]
    fn zero_time_budget_fetches_nothing() {
        let mut cfg = test_config();
        cfg.time_budget = Duration::ZERO;
        let mut calls = 0;
        let outcome = crawl_until(
            &cfg,
            date("2023-01-01T00:00:00Z"),
            Some("42"),
            |_| {
                calls += 1;
                page(page_of(40, 100, "2023-06-01T00:00:00Z"))
            },
            None,
        )
        .unwrap();
        assert_eq!(calls, 0);
        assert!(outcome.statuses.is_empty());
        assert_eq!(outcome.last_cursor.as_deref(), Some("42"));
        assert!(!outcome.reached_threshold);
    }

    #[test]
    fn fell_back_is_monotone() {
        let cfg = test_config();
        let mut call = 0;
        let outcome = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |_| {
                call += 1;
                Ok(StatusPage {
                    statuses: if call < 3 {
                        page_of(40, 1000 - 40 * (call - 1), "2023-06-01T00:00:00Z")
                    } else {
                        vec![]
                    },
                    // only the first page fell back
                    fell_back: call == 1,
                })
            },
            None,
        )
        .unwrap();
        assert!(outcome.fell_back);
    }

    #[test]
    fn fetch_error_aborts_without_partial_result() {
        let cfg = test_config();
        let mut call = 0;
        let err = crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |_| {
                call += 1;
                if call == 1 {
                    page(page_of(40, 100, "2023-06-01T00:00:00Z"))
                } else {
                    Err(ApiError::Http {
                        status: 500,
                        message: "server error".to_string(),
                    })
                }
            },
            None,
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn progress_reports_cumulative_counts() {
        let cfg = test_config();
        let mut call = 0;
        let mut reported: Vec<usize> = Vec::new();
        let mut on_progress = |n: usize| reported.push(n);
        crawl_until(
            &cfg,
            date("2020-01-01T00:00:00Z"),
            None,
            |_| {
                call += 1;
                match call {
                    1 => page(vec![
                        status("9", "2023-06-01T00:03:00Z", false),
                        status("8", "2023-06-01T00:02:00Z", true),
                        status("7", "2023-06-01T00:01:00Z", false),
                    ]),
                    _ => panic!("undersized page should have stopped the crawl"),
                }
            },
            Some(&mut on_progress),
        )
        .unwrap();
        assert_eq!(reported, [2]);
    }

    #[test]
    fn progress_called_once_per_page() {
        let cfg = test_config();
        let mut call = 0;
        let mut reported: Vec<usize> = Vec::new();
        let mut on_progress = |n: usize| reported.push(n);
        crawl_until(
            &cfg,
            date("2023-05-15T00:00:00Z"),
            None,
            |_| {
                call += 1;
                match call {
                    1 => page(page_of(40, 200, "2023-06-01T00:00:00Z")),
                    _ => page(page_of(40, 160, "2023-05-01T00:00:00Z")),
                }
            },
            Some(&mut on_progress),
        )
        .unwrap();
        assert_eq!(reported, [40, 80]);
    }
}
