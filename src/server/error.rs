// src/server/error.rs
// =============================================================================
// Everything that can go wrong while resolving one request, and what the
// client sees for each:
//
//   Validation -> 400, plain text explaining the segment count
//   Fetch      -> 502, opaque (network trouble reaching the upstream)
//   Body       -> 502, opaque (file too large, or the body read failed)
//
// "Upstream said 404/403" is NOT an error here: that case is answered with a
// redirect by the handler.
// =============================================================================

use crate::locator::ParseError;
use crate::upstream::{BodyError, FetchError};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Validation(#[from] ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Body(#[from] BodyError),
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ResolveError::Validation(err) => (StatusCode::BAD_REQUEST, format!("{}\n", err)),
            ResolveError::Fetch(_) | ResolveError::Body(_) => {
                warn!(error = %self, "failed to resolve file");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to retrieve the file from upstream\n".to_string(),
                )
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}
