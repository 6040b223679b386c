//! Deciding between a full and a partial transfer, and turning that
//! decision into a response.

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, HeaderMapExt};
use tokio::io::AsyncRead;

use crate::bounded::BoundedStream;
use crate::error::Error;
use crate::range::{parse_range_header, RangeError, RangeSpec};
use crate::stream::ResponseStream;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The outcome of one download request.
#[derive(Debug)]
pub enum TransferOutcome<R> {
    /// No range requested; the upstream body is sent unmodified.
    Full { body: R, total_length: Option<u64> },
    /// A satisfiable range; only its bytes are sent.
    Partial { body: BoundedStream<R>, range: RangeSpec },
    /// The range parsed but lies outside the resource.
    RangeNotSatisfiable { total_length: Option<u64> },
    /// The range header could not be parsed.
    MalformedRange { header: String },
}

impl<R> TransferOutcome<R> {
    pub fn status(&self) -> StatusCode {
        match self {
            TransferOutcome::Full { .. } => StatusCode::OK,
            TransferOutcome::Partial { .. } => StatusCode::PARTIAL_CONTENT,
            TransferOutcome::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            TransferOutcome::MalformedRange { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

/// Decide how to answer a request for an upstream body of `total_length`
/// bytes, given the raw `Range` header if there was one.
///
/// An unknown length is treated as `0` when a range is requested, so any
/// range against it is not satisfiable. Nothing is read from `body` here.
pub fn decide<R>(
    range_header: Option<&str>,
    body: R,
    total_length: Option<u64>,
) -> TransferOutcome<R> {
    let header = match range_header {
        Some(header) if !header.is_empty() => header,
        _ => {
            tracing::debug!(total_length, "no range requested, full transfer");
            return TransferOutcome::Full { body, total_length };
        }
    };

    let resolved = parse_range_header(header)
        .map_err(RangeError::from)
        .and_then(|raw| raw.resolve(total_length.unwrap_or(0)));

    match resolved {
        Ok(range) => {
            tracing::debug!(
                from = range.from(),
                to = range.to(),
                total_length = range.total_length(),
                "partial transfer"
            );
            let body = BoundedStream::new(body, &range);
            TransferOutcome::Partial { body, range }
        }
        Err(RangeError::NotSatisfiable) => {
            tracing::warn!(range = %header, total_length, "range not satisfiable");
            TransferOutcome::RangeNotSatisfiable { total_length }
        }
        Err(RangeError::Malformed) => {
            TransferOutcome::MalformedRange { header: header.to_string() }
        }
    }
}

/// A [`TransferOutcome`] plus the resource metadata sent alongside it.
/// Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Relayed<R> {
    outcome: TransferOutcome<R>,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl<R: AsyncRead + Send + 'static> Relayed<R> {
    pub fn new(outcome: TransferOutcome<R>) -> Self {
        Relayed { outcome, content_type: None, file_name: None }
    }

    /// Content type declared by the upstream. Guessed from the file name when absent.
    pub fn content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Name offered to the client in `Content-Disposition`.
    pub fn file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = file_name;
        self
    }

    fn entity_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.typed_insert(AcceptRanges::bytes());

        let content_type = self
            .content_type
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
            .unwrap_or_else(|| guess_content_type(self.file_name.as_deref()));
        headers.insert(CONTENT_TYPE, content_type);

        if let Some(disposition) = self.file_name.as_deref().and_then(content_disposition) {
            headers.insert(CONTENT_DISPOSITION, disposition);
        }

        headers
    }
}

impl<R: AsyncRead + Send + 'static> IntoResponse for Relayed<R> {
    fn into_response(self) -> Response {
        let status = self.outcome.status();
        let mut headers = self.entity_headers();

        let body = match self.outcome {
            TransferOutcome::Full { body, total_length } => {
                if let Some(length) = total_length {
                    headers.typed_insert(ContentLength(length));
                }
                Body::new(ResponseStream::new(body, total_length))
            }
            TransferOutcome::Partial { body, range } => {
                headers.typed_insert(range.content_range());
                headers.typed_insert(ContentLength(range.len()));
                Body::new(ResponseStream::new(body, Some(range.len())))
            }
            TransferOutcome::RangeNotSatisfiable { total_length } => {
                let total_length = total_length.unwrap_or(0);
                return Error::RangeNotSatisfiable { total_length }.into_response();
            }
            TransferOutcome::MalformedRange { header } => {
                return Error::MalformedRange(header).into_response();
            }
        };

        (status, headers, body).into_response()
    }
}

fn guess_content_type(file_name: Option<&str>) -> HeaderValue {
    file_name
        .and_then(|name| mime_guess::from_path(name).first())
        .and_then(|mime| HeaderValue::from_str(mime.as_ref()).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
}

fn content_disposition(file_name: &str) -> Option<HeaderValue> {
    let file_name: String = file_name
        .chars()
        .filter(|c| c.is_ascii_graphic() && *c != '"' && *c != '\\')
        .collect();
    if file_name.is_empty() {
        return None;
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")).ok()
}
