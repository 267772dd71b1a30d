// src/upstream/fetch.rs
// =============================================================================
// This module fetches a single file from the raw-file host.
//
// Strategy:
// - Build the URL: {raw_host}/{org}/{repo}/{ref}/{file}
// - Send ONE GET request (reqwest follows redirects for us)
// - 2xx     -> Success, with the body left as an unread stream
// - non-2xx -> NotFoundOrForbidden, with the URL we finally landed on
//
// Why treat 403 and 404 the same way?
// - raw.githubusercontent.com answers 404 for private repos too
// - We can't tell "missing" from "needs a login", so the caller redirects
//   the client to the failing URL and lets its own credentials have a go
//
// Rust concepts:
// - async functions: For network I/O
// - Enums with data: To describe the possible outcomes
// - Boxed streams: To hand the body to the bounded reader
// =============================================================================

use super::body::{read_bounded, BodyError};
use crate::cache::ForwardedHeaders;
use crate::locator::Locator;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, CONTENT_TYPE, ETAG, EXPIRES};
use reqwest::{redirect, Client};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

// Follow at most this many upstream redirects
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid upstream url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream request to {url} timed out")]
    Timeout { url: String },

    #[error("upstream request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

// What came back from the upstream
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx: the file exists and we can read it
    Success(Fetched),
    /// Anything else: missing, private, or otherwise not ours to read
    NotFoundOrForbidden { final_url: String },
}

// A successful response whose body has not been read yet
pub struct Fetched {
    pub status: u16,
    pub headers: ForwardedHeaders,
    /// Raw `Expires` header, if the upstream sent one
    pub expires: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl Fetched {
    // Reads the body, giving up once it passes `limit` bytes
    pub async fn read_body(self, limit: usize) -> Result<Bytes, BodyError> {
        read_bounded(self.body, self.content_length, limit).await
    }
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("expires", &self.expires)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

// Fetches files from one raw-file host
//
// Holds a single reqwest Client so connections are pooled across requests.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    raw_host: String,
}

impl Fetcher {
    // Parameters:
    //   raw_host: base URL, e.g. "https://raw.githubusercontent.com"
    //   timeout: how long one upstream request may take in total
    pub fn new(raw_host: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            raw_host: raw_host.into().trim_end_matches('/').to_string(),
        })
    }

    // The URL a locator resolves to
    //
    // Example:
    //   acme/widget@v2, file "widget.sh" ->
    //   "https://raw.githubusercontent.com/acme/widget/v2/widget.sh"
    pub fn upstream_url(&self, locator: &Locator) -> Result<Url, FetchError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_host, locator.org, locator.repo, locator.git_ref, locator.file
        );
        Url::parse(&url).map_err(|source| FetchError::InvalidUrl { url, source })
    }

    pub async fn fetch(&self, locator: &Locator) -> Result<FetchOutcome, FetchError> {
        let url = self.upstream_url(locator)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url.as_str(), e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            warn!(
                url = %url,
                final_url = %final_url,
                status = status.as_u16(),
                "upstream refused, redirecting client"
            );
            return Ok(FetchOutcome::NotFoundOrForbidden { final_url });
        }

        info!(url = %final_url, status = status.as_u16(), "fetched from upstream");

        let headers = response.headers();
        let forwarded = ForwardedHeaders {
            content_type: header_string(headers, &CONTENT_TYPE),
            etag: header_string(headers, &ETAG),
            content_location: Some(final_url),
        };
        let expires = header_string(headers, &EXPIRES);
        let content_length = response.content_length();

        Ok(FetchOutcome::Success(Fetched {
            status: status.as_u16(),
            headers: forwarded,
            expires,
            content_length,
            body: response.bytes_stream().boxed(),
        }))
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn transport_error(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source,
        }
    }
}
