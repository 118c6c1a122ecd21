//! Classification of HTTP failures into retryable and terminal errors.

use reqwest::StatusCode;

/// Maximum number of attempts for a single request.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Header GitHub uses to report the remaining request quota.
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// A request failure that will not succeed when repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// HTTP 429, or HTTP 403 with an exhausted quota
    RateLimitExceeded(String),
    /// HTTP 401
    AuthenticationFailed(String),
    /// HTTP 404
    NotFound(String),
    /// HTTP 403 with quota left
    Forbidden(String),
    /// Any other 4xx
    ClientError(u16, String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::RateLimitExceeded(url) => write!(
                f,
                "Rate limit exceeded for {}. Try again later or set the GITHUB_TOKEN environment variable.",
                url
            ),
            RequestError::AuthenticationFailed(url) => write!(
                f,
                "Authentication failed for {}. Check your GITHUB_TOKEN.",
                url
            ),
            RequestError::NotFound(url) => write!(f, "Not found: {}", url),
            RequestError::Forbidden(url) => {
                write!(f, "Access forbidden: {}. You may need authentication.", url)
            }
            RequestError::ClientError(status, url) => {
                write!(f, "Request error: HTTP {} from {}", status, url)
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// Maps a failed response status to a terminal error.
///
/// Returns `None` for statuses worth retrying (5xx and anything unexpected).
pub fn classify_status(
    status: StatusCode,
    rate_limit_remaining: Option<&str>,
    url: &str,
) -> Option<RequestError> {
    let url = url.to_string();
    match status {
        StatusCode::UNAUTHORIZED => Some(RequestError::AuthenticationFailed(url)),
        StatusCode::FORBIDDEN if rate_limit_remaining.map(str::trim) == Some("0") => {
            Some(RequestError::RateLimitExceeded(url))
        }
        StatusCode::FORBIDDEN => Some(RequestError::Forbidden(url)),
        StatusCode::TOO_MANY_REQUESTS => Some(RequestError::RateLimitExceeded(url)),
        StatusCode::NOT_FOUND => Some(RequestError::NotFound(url)),
        s if s.is_client_error() => Some(RequestError::ClientError(s.as_u16(), url)),
        _ => None,
    }
}

/// Reads the quota header from a response, if present.
pub fn rate_limit_remaining(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(RATE_LIMIT_REMAINING)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Whether an error chain ends in a terminal request failure.
pub fn is_terminal(e: &anyhow::Error) -> bool {
    e.downcast_ref::<RequestError>().is_some()
}

/// Whether an error chain ends in an HTTP 404.
pub fn is_not_found(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<RequestError>(), Some(RequestError::NotFound(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://api.github.com/repos/alice/widget/releases";

    #[test]
    fn test_classify_unauthorized() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, None, URL),
            Some(RequestError::AuthenticationFailed(URL.to_string()))
        );
    }

    #[test]
    fn test_classify_forbidden_with_exhausted_quota_is_rate_limit() {
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, Some("0"), URL),
            Some(RequestError::RateLimitExceeded(URL.to_string()))
        );
    }

    #[test]
    fn test_classify_forbidden_with_quota_left() {
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, Some("42"), URL),
            Some(RequestError::Forbidden(URL.to_string()))
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, None, URL),
            Some(RequestError::Forbidden(URL.to_string()))
        );
    }

    #[test]
    fn test_classify_too_many_requests() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, URL),
            Some(RequestError::RateLimitExceeded(_))
        ));
    }

    #[test]
    fn test_classify_not_found_and_other_client_errors() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, URL),
            Some(RequestError::NotFound(_))
        ));
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, None, URL),
            Some(RequestError::ClientError(422, URL.to_string()))
        );
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, None, URL),
            None
        );
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY, None, URL), None);
    }

    #[test]
    fn test_display_mentions_token_for_rate_limit() {
        let err = RequestError::RateLimitExceeded(URL.to_string());
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        let err = RequestError::ClientError(400, URL.to_string());
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn test_is_not_found_through_context() {
        let err = anyhow::Error::from(RequestError::NotFound(URL.to_string()))
            .context("Failed to fetch releases");
        assert!(is_not_found(&err));
        assert!(is_terminal(&err));

        let err = anyhow::anyhow!("connection reset");
        assert!(!is_not_found(&err));
        assert!(!is_terminal(&err));
    }
}
