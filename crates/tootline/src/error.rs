//! Error taxonomy for API calls

/// Error from one API operation.
///
/// Rate-limit (429) responses are retried inside the request layer and only
/// show up here as `Http` once the retry budget is exhausted. A 401/403 on
/// the statuses-page endpoint is handled by the public-access fallback and
/// never reaches the caller; on every other endpoint it surfaces as `Http`.
#[derive(Debug)]
pub enum ApiError {
    /// Non-2xx response, message parsed from the body where possible
    Http { status: u16, message: String },
    /// Transport-level failure, propagated unmodified
    Network(reqwest::Error),
    /// 2xx response whose body did not parse as the expected JSON
    Json(serde_json::Error),
    /// Auth-required call issued with no access token configured
    MissingToken,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Network(e) => write!(f, "network error: {e}"),
            Self::Json(e) => write!(f, "invalid response body: {e}"),
            Self::MissingToken => write!(f, "no access token configured"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl ApiError {
    /// HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The request was understood but the credentials were not good enough.
    ///
    /// On the statuses-page endpoint this triggers the public-access
    /// fallback; everywhere else it is fatal.
    pub fn is_auth_insufficient(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
