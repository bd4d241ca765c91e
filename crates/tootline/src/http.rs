//! Request layer: shared client/runtime and rate-limit-aware GET
//!
//! Uses async reqwest internally but presents a sync interface; every
//! round trip and every backoff sleep happens inline on the calling
//! thread, so suspension points within one crawl are strictly ordered.

use std::sync::LazyLock;
use std::time::Duration;

use crate::error::ApiError;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout (connect + body)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("tootline/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// One response, success body or failure details for the retry decision
enum Fetched {
    Ok(String),
    Failed {
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    },
}

fn get_once(
    url: &str,
    query: &[(&str, String)],
    token: Option<&str>,
) -> Result<Fetched, ApiError> {
    SHARED_RUNTIME.handle().block_on(async {
        let mut req = http_client().get(url).query(query);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(ApiError::Network)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(Fetched::Ok(resp.text().await.map_err(ApiError::Network)?));
        }
        let retry_after = parse_retry_after(resp.headers());
        let body = resp.text().await.unwrap_or_default();
        Ok(Fetched::Failed {
            status: status.as_u16(),
            retry_after,
            body,
        })
    })
}

/// HTTP GET with retry for rate limit (429), returning the body text.
///
/// Attaches a bearer token only when one is supplied. A 429 is retried up
/// to `max_retries` extra times, waiting for the server's `Retry-After`
/// (seconds) when present, else `base_backoff * 2^attempt`. A 429 that
/// outlives the budget, and any other non-2xx, become [`ApiError::Http`]
/// with the message parsed from the body.
pub fn get_with_retry(
    url: &str,
    query: &[(&str, String)],
    token: Option<&str>,
    max_retries: u32,
    base_backoff: Duration,
) -> Result<String, ApiError> {
    let mut attempt = 0u32;
    loop {
        match get_once(url, query, token)? {
            Fetched::Ok(body) => return Ok(body),
            Fetched::Failed {
                status: 429,
                retry_after,
                ..
            } if attempt < max_retries => {
                let wait = retry_after.unwrap_or_else(|| base_backoff * 2u32.pow(attempt));
                attempt += 1;
                log::warn!("rate limited, retry {attempt}/{max_retries} in {wait:?}");
                std::thread::sleep(wait);
            }
            Fetched::Failed { status, body, .. } => {
                return Err(ApiError::Http {
                    status,
                    message: error_message(status, &body),
                });
            }
        }
    }
}

/// Retry-After header in seconds, when present and numeric
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Error text from a JSON body's `error` field, generic fallback otherwise
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| format!("request failed with status {status}"))
}
