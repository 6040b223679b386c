//! Error types for range-relay.
//!
//! Every caller-facing failure of a download request maps to exactly one
//! HTTP status via [`Error::status_code`]. Upstream and I/O failures are
//! logged and rendered as a generic 500 so no upstream detail leaks.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::ContentRange;
use axum_extra::TypedHeader;
use thiserror::Error;

/// Result type alias for range-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for range-relay
#[derive(Debug, Error)]
pub enum Error {
    /// The `fileUrl` parameter was missing, empty, or not an http(s) URL
    #[error("invalid file url: {0:?}")]
    InvalidUrl(String),

    /// The `Range` header text could not be parsed
    #[error("malformed range header: {0:?}")]
    MalformedRange(String),

    /// The range parsed but falls outside the resource
    #[error("range not satisfiable for a resource of {total_length} bytes")]
    RangeNotSatisfiable {
        /// Length the range was checked against (0 when the upstream did not declare one)
        total_length: u64,
    },

    /// Fetching the upstream resource failed or it answered with a non-success status
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error with the offending key
    #[error("configuration error: {key}: {message}")]
    Config {
        /// Environment key or field name that was rejected
        key: String,
        /// Human-readable description of the problem
        message: String,
    },
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidUrl(_) | Error::MalformedRange(_) => StatusCode::BAD_REQUEST,
            Error::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Error::Upstream(_) | Error::Io(_) | Error::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Error::InvalidUrl(url) => {
                tracing::debug!(url = %url, "rejecting download request");
                (status, "Invalid file URL.").into_response()
            }
            Error::MalformedRange(header) => {
                tracing::warn!(range = %header, "malformed range header");
                (status, "Invalid Range header.").into_response()
            }
            Error::RangeNotSatisfiable { total_length } => {
                let content_range = TypedHeader(ContentRange::unsatisfied_bytes(total_length));
                (status, content_range, ()).into_response()
            }
            err => {
                tracing::error!(error = %err, "download failed");
                (status, "Internal server error.").into_response()
            }
        }
    }
}
