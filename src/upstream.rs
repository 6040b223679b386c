//! Fetching the upstream resource.
//!
//! The relay only needs three things from the upstream: a sequential body,
//! its declared length, and a content type label. [`Fetch`] is that
//! contract; [`HttpFetcher`] fulfils it with a pooled [`reqwest::Client`].

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use futures::TryStreamExt;
use reqwest::Url;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::config::RelayConfig;
use crate::error::Result;

/// Sequential upstream body.
pub type UpstreamBody = Pin<Box<dyn AsyncRead + Send>>;

/// What a successful fetch hands to the transfer logic.
pub struct UpstreamResource {
    pub body: UpstreamBody,
    /// Declared `Content-Length`, if the upstream sent one.
    pub total_length: Option<u64>,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for UpstreamResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResource")
            .field("total_length", &self.total_length)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Source of upstream resources.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Start fetching `url`. Resolves once the response head is available;
    /// the body is read lazily through [`UpstreamResource::body`].
    async fn fetch(&self, url: &Url) -> Result<UpstreamResource>;
}

/// [`Fetch`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(HttpFetcher { client: builder.build()? })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<UpstreamResource> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let total_length = response.content_length();

        tracing::debug!(
            url = %url,
            status = %response.status(),
            total_length,
            content_type = content_type.as_deref(),
            "upstream responded"
        );

        let body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));

        Ok(UpstreamResource {
            body: Box::pin(body),
            total_length,
            content_type,
        })
    }
}

/// Last non-empty path segment of `url`, used as the download file name.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()?.filter(|segment| !segment.is_empty()).last()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::Error;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&RelayConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_exposes_length_type_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/report.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("Hello, World!", "text/plain"))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/files/report.txt", mock_server.uri())).unwrap();
        let mut resource = fetcher().fetch(&url).await.unwrap();

        assert_eq!(Some(13), resource.total_length);
        assert_eq!(Some("text/plain"), resource.content_type.as_deref());

        let mut body = String::new();
        resource.body.read_to_string(&mut body).await.unwrap();
        assert_eq!("Hello, World!", body);
    }

    #[tokio::test]
    async fn test_fetch_fails_on_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/missing.bin", mock_server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert_matches!(
            err,
            Error::Upstream(e) if e.status() == Some(reqwest::StatusCode::NOT_FOUND)
        );
    }

    #[test]
    fn test_file_name() {
        let name = |url: &str| file_name(&Url::parse(url).unwrap()).map(str::to_string);
        assert_eq!(Some("movie.mp4".to_string()), name("https://example.com/media/movie.mp4"));
        assert_eq!(Some("media".to_string()), name("https://example.com/media/"));
        assert_eq!(Some("a%20b.txt".to_string()), name("https://example.com/a b.txt?x=1"));
        assert_eq!(None, name("https://example.com/"));
    }
}
