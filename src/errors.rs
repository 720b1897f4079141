use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Every failure of the scrape pipeline is represented here and rendered as a
/// `{"error": "..."}` JSON body; nothing else crosses the HTTP boundary.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Invalid request input (empty query, malformed `maxResults`).
    BadRequest(String),
    /// The map-search provider failed (transport, non-2xx status, bad payload).
    ExternalApiError(String),
    /// The provider rejected the request because of its quota.
    RateLimited(String),
    /// A scrape is already in flight for this session.
    Busy,
    /// The scrape did not finish within the configured deadline.
    Timeout(String),
    /// The scrape was abandoned before completing.
    Cancelled,
    /// Resource not found error.
    NotFound(String),
    /// Lead data that cannot be exported. Indicates a broken invariant upstream.
    Encoding(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Provider rate limited: {}", msg),
            AppError::Busy => write!(f, "A scrape is already running for this session"),
            AppError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            AppError::Cancelled => write!(f, "Scrape cancelled"),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to fetch listings from the map provider".to_string(),
                )
            }
            AppError::RateLimited(msg) => {
                tracing::warn!("Provider rate limited: {}", msg);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Map provider rate limit reached, try again later".to_string(),
                )
            }
            AppError::Busy => (
                StatusCode::CONFLICT,
                "A scrape is already in progress for this session".to_string(),
            ),
            AppError::Timeout(msg) => {
                tracing::warn!("Scrape timed out: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Scrape timed out".to_string())
            }
            AppError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Scrape cancelled".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Encoding(msg) => {
                tracing::error!("Encoding error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to encode leads".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(format!("Places request failed: {}", err))
    }
}

impl From<csv::Error> for AppError {
    /// Converts a `csv::Error` into an `AppError`.
    fn from(err: csv::Error) -> Self {
        AppError::Encoding(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_context_chain() {
        let err: Result<(), AppError> = Err(AppError::RateLimited("429".to_string()));
        let wrapped = err
            .with_context(|| "page 1".to_string())
            .with_context(|| "query 'coffee'".to_string())
            .unwrap_err();

        assert!(matches!(wrapped.root(), AppError::RateLimited(_)));
        assert_eq!(
            wrapped.to_string(),
            "query 'coffee': page 1: Provider rate limited: 429"
        );
    }

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (AppError::BadRequest("q".into()), StatusCode::BAD_REQUEST),
            (AppError::Busy, StatusCode::CONFLICT),
            (AppError::RateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (AppError::ExternalApiError("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Encoding("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_context_keeps_source_status() {
        let err = AppError::WithContext {
            source: Box::new(AppError::Busy),
            context: "session abc".to_string(),
        };
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
