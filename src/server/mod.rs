// src/server/mod.rs
// =============================================================================
// The HTTP side of the program.
//
// Submodules:
// - handler: the resolve pipeline (parse -> cache -> fetch -> respond)
// - error: how failures are turned into HTTP responses
// - view: content negotiation and the HTML document view
//
// Every path is a short URL, so there are no routes: a single fallback
// handler receives everything.
// =============================================================================

mod error;
mod handler;
mod view;

use crate::cache::ExpiringCache;
use crate::cli::Settings;
use crate::upstream::{FetchError, Fetcher};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Shared by every request; cloning only bumps reference counts
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<ExpiringCache>,
    pub fetcher: Arc<Fetcher>,
}

impl AppState {
    // Builds the state for a fresh process: an empty cache sized from the
    // settings and an HTTP client pointed at the raw-file host
    pub fn new(settings: Settings) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(settings.raw_host.clone(), settings.fetch_timeout)?;
        let cache = ExpiringCache::new(settings.cache_size);

        Ok(Self {
            settings: Arc::new(settings),
            cache: Arc::new(cache),
            fetcher: Arc::new(fetcher),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(handler::resolve)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use mockito::Server;
    use tower::ServiceExt;

    fn state_for(upstream: &Server) -> AppState {
        let settings = Settings {
            raw_host: upstream.url(),
            cache_size: 64,
            body_limit: 32,
            ..Settings::default()
        };
        AppState::new(settings).unwrap()
    }

    async fn get(state: &AppState, uri: &str) -> Response {
        get_with_accept(state, uri, "*/*").await
    }

    async fn get_with_accept(state: &AppState, uri: &str, accept: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap();
        router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_raw_file_with_allow_listed_headers() {
        let mut upstream = Server::new_async().await;
        let _m = upstream
            .mock("GET", "/acme/widget/v2/widget.sh")
            .with_status(200)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_header("etag", "\"w1\"")
            .with_header("x-upstream-secret", "leak")
            .with_body("echo widget\n")
            .create_async()
            .await;
        let state = state_for(&upstream);

        let response = get(&state, "/acme/widget@v2").await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(headers[header::ETAG], "\"w1\"");
        assert_eq!(
            headers[header::CONTENT_LOCATION],
            format!("{}/acme/widget/v2/widget.sh", upstream.url()).as_str()
        );
        assert!(headers.get("x-upstream-secret").is_none());
        assert_eq!(body_text(response).await, "echo widget\n");
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let mut upstream = Server::new_async().await;
        let m = upstream
            .mock("GET", "/importpw/import/master/import.sh")
            .with_status(200)
            .with_body("import\n")
            .expect(1)
            .create_async()
            .await;
        let state = state_for(&upstream);

        for _ in 0..3 {
            let response = get(&state, "/").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "import\n");
        }

        m.assert_async().await;
        assert_eq!(state.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_on_arrival_is_refetched() {
        let mut upstream = Server::new_async().await;
        let m = upstream
            .mock("GET", "/importpw/stale/master/stale.sh")
            .with_status(200)
            .with_header("expires", "Thu, 01 Jan 1970 00:00:00 GMT")
            .with_body("stale\n")
            .expect(2)
            .create_async()
            .await;
        let state = state_for(&upstream);

        assert_eq!(get(&state, "/stale").await.status(), StatusCode::OK);
        assert_eq!(get(&state, "/stale").await.status(), StatusCode::OK);

        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_expires_zero_is_not_served_from_cache() {
        let mut upstream = Server::new_async().await;
        let m = upstream
            .mock("GET", "/importpw/nocache/master/nocache.sh")
            .with_status(200)
            .with_header("expires", "0")
            .with_body("fresh\n")
            .expect(2)
            .create_async()
            .await;
        let state = state_for(&upstream);

        for _ in 0..2 {
            let response = get(&state, "/nocache").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "fresh\n");
        }

        m.assert_async().await;
        let locator = crate::locator::parse("/nocache", None, &state.settings.defaults).unwrap();
        assert!(state.cache.get(&locator.cache_key()).is_none());
    }

    #[tokio::test]
    async fn test_explicit_file_parameter() {
        let mut upstream = Server::new_async().await;
        let _m = upstream
            .mock("GET", "/acme/widget/master/bin/install.sh")
            .with_status(200)
            .with_body("install\n")
            .create_async()
            .await;
        let state = state_for(&upstream);

        let response = get(&state, "/acme/widget?file=bin/install.sh").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "install\n");
    }

    #[tokio::test]
    async fn test_upstream_not_found_redirects_and_is_not_cached() {
        let mut upstream = Server::new_async().await;
        let m = upstream
            .mock("GET", "/acme/private/master/private.sh")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;
        let state = state_for(&upstream);
        let expected = format!("{}/acme/private/master/private.sh", upstream.url());

        for _ in 0..2 {
            let response = get(&state, "/acme/private").await;
            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(response.headers()[header::LOCATION], expected.as_str());
        }

        m.assert_async().await;
        assert_eq!(state.cache.len(), 0);
    }

    #[tokio::test]
    async fn test_too_many_segments_is_bad_request() {
        let upstream = Server::new_async().await;
        let state = state_for(&upstream);

        let response = get(&state, "/a/b/c").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_text(response).await,
            "Expected up to 2 slashes in the URL, but got 3\n"
        );
    }

    #[tokio::test]
    async fn test_favicon_redirects_to_avatar() {
        let upstream = Server::new_async().await;
        let state = state_for(&upstream);

        let response = get(&state, "/favicon.ico").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://github.com/importpw.png"
        );
        assert_eq!(state.cache.len(), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_fails_and_is_not_cached() {
        let mut upstream = Server::new_async().await;
        let _m = upstream
            .mock("GET", "/acme/huge/master/huge.sh")
            .with_status(200)
            .with_body("x".repeat(33))
            .create_async()
            .await;
        let state = state_for(&upstream);

        let response = get(&state, "/acme/huge").await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(state.cache.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_larger_than_cache_is_served_but_not_cached() {
        let mut upstream = Server::new_async().await;
        let _m = upstream
            .mock("GET", "/acme/big/master/big.sh")
            .with_status(200)
            .with_body("y".repeat(30))
            .create_async()
            .await;
        let settings = Settings {
            raw_host: upstream.url(),
            cache_size: 16,
            body_limit: 64,
            ..Settings::default()
        };
        let state = AppState::new(settings).unwrap();

        let response = get(&state, "/acme/big").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await.len(), 30);
        assert_eq!(state.cache.len(), 0);
    }

    #[tokio::test]
    async fn test_browser_gets_rendered_document() {
        let mut upstream = Server::new_async().await;
        let _m = upstream
            .mock("GET", "/acme/docs/master/README.md")
            .with_status(200)
            .with_body("# Docs\n")
            .create_async()
            .await;
        let state = state_for(&upstream);

        let response = get_with_accept(&state, "/acme/docs?file=README.md", "text/html").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        let page = body_text(response).await;
        assert!(page.contains("<h1>Docs</h1>"));
        assert!(page.contains("<title>acme/docs</title>"));
    }

    #[tokio::test]
    async fn test_json_view_describes_locator_without_fetching() {
        let mut upstream = Server::new_async().await;
        let m = upstream
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let state = state_for(&upstream);

        let response = get_with_accept(&state, "/acme/widget@v2", "application/json").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["org"], "acme");
        assert_eq!(json["repo"], "widget");
        assert_eq!(json["ref"], "v2");
        assert_eq!(json["file"], "widget.sh");
        assert_eq!(
            json["url"],
            format!("{}/acme/widget/v2/widget.sh", upstream.url())
        );
        m.assert_async().await;
    }
}
