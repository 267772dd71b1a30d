// src/server/handler.rs
// =============================================================================
// The request handler: one short URL in, one file (or redirect) out.
//
// Steps for every request:
// 1. /favicon.ico        -> redirect to the org's GitHub avatar, done
// 2. Parse the path       -> 400 if it has too many segments
// 3. Accept: json         -> describe the locator, no fetch
// 4. Look in the cache    -> hit? skip to 6
// 5. Fetch from upstream
//      not 2xx            -> 302 to the URL that failed, nothing cached
//      2xx                -> read the body (size-capped), cache it
// 6. Respond: raw bytes with the allow-listed headers, or an HTML page for
//    browsers
//
// Rust concepts:
// - axum extractors: State, Query, HeaderMap pulled straight from the request
// - Result<Response, ResolveError>: errors turn into responses via IntoResponse
// - Arc: The cached entry is shared, not copied
// =============================================================================

use super::error::ResolveError;
use super::view::{self, LocatorView};
use super::AppState;
use crate::cache::{ttl_from_expires, CacheEntry};
use crate::locator::{self, CacheKey, Locator};
use crate::upstream::FetchOutcome;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Json, Response};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const FAVICON_PATH: &str = "/favicon.ico";

// The query string: only `file` means anything to us
#[derive(Debug, Default, Deserialize)]
pub struct ResolveParams {
    pub file: Option<String>,
}

// What a cache miss turns into
enum Resolved {
    Entry(Arc<CacheEntry>),
    Redirect(String),
}

pub async fn resolve(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<ResolveParams>,
    headers: HeaderMap,
) -> Result<Response, ResolveError> {
    let settings = &state.settings;

    if uri.path() == FAVICON_PATH {
        let avatar = format!("{}/{}.png", settings.avatar_host, settings.defaults.org);
        return Ok(redirect(&avatar));
    }

    let locator = locator::parse(uri.path(), params.file.as_deref(), &settings.defaults)?;

    let html = view::wants_html(&headers);
    if !html && view::wants_json(&headers) {
        let url = state.fetcher.upstream_url(&locator)?.to_string();
        return Ok(Json(LocatorView {
            locator: &locator,
            url,
        })
        .into_response());
    }

    let key = locator.cache_key();
    let entry = match state.cache.get(&key) {
        Some(entry) => {
            debug!(key = %key, "cache hit");
            entry
        }
        None => {
            debug!(locator = %locator, "cache miss");
            match fetch_and_store(&state, &locator, key).await? {
                Resolved::Entry(entry) => entry,
                Resolved::Redirect(url) => return Ok(redirect(&url)),
            }
        }
    };

    if html {
        let page = view::render_document(&locator, &entry.body, settings);
        return Ok(Html(page).into_response());
    }

    Ok(raw_response(&entry))
}

async fn fetch_and_store(
    state: &AppState,
    locator: &Locator,
    key: CacheKey,
) -> Result<Resolved, ResolveError> {
    let fetched = match state.fetcher.fetch(locator).await? {
        FetchOutcome::Success(fetched) => fetched,
        // Maybe a private repo: let the client retry with its own credentials
        FetchOutcome::NotFoundOrForbidden { final_url } => {
            return Ok(Resolved::Redirect(final_url));
        }
    };

    let status = fetched.status;
    let headers = fetched.headers.clone();
    let ttl = ttl_from_expires(fetched.expires.as_deref(), Utc::now());
    let body = fetched.read_body(state.settings.body_limit).await?;

    let entry = CacheEntry::new(status, headers, body);

    // Keep a copy to serve in case the cache refuses to store it
    let response_entry = Arc::new(entry.clone());
    if state.cache.set(key, entry, ttl) {
        debug!(
            entries = state.cache.len(),
            bytes = state.cache.weight(),
            "stored in cache"
        );
    }

    Ok(Resolved::Entry(response_entry))
}

fn raw_response(entry: &CacheEntry) -> Response {
    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);

    let mut headers = HeaderMap::new();
    for (name, value) in entry.headers.iter() {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }

    (status, headers, entry.body.clone()).into_response()
}

fn redirect(url: &str) -> Response {
    let location = match HeaderValue::from_str(url) {
        Ok(location) => location,
        Err(_) => return StatusCode::BAD_GATEWAY.into_response(),
    };

    (
        StatusCode::FOUND,
        [(header::LOCATION, location)],
        format!("Redirecting to {}\n", url),
    )
        .into_response()
}
