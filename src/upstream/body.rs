// src/upstream/body.rs
// =============================================================================
// Reads a response body into memory, but never more than `limit` bytes.
//
// The body arrives as a stream of chunks. We add them up as they come in and
// bail out the moment the running total would pass the limit, so a huge file
// can't blow up our memory. Nothing partial is ever returned.
// =============================================================================

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum BodyError {
    /// The body is (or claims to be) bigger than the ceiling
    #[error("response body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    /// The connection failed half way through the body
    #[error("failed to read response body: {0}")]
    Read(#[source] BoxError),
}

// Collects `stream` into one buffer of at most `limit` bytes
//
// Parameters:
//   stream: chunks of the body, in order
//   declared_len: the Content-Length header, if the upstream sent one
//   limit: the ceiling in bytes
pub async fn read_bounded<S, E>(
    mut stream: S,
    declared_len: Option<u64>,
    limit: usize,
) -> Result<Bytes, BodyError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    // Fail fast when the upstream tells us up front that it's too big
    if let Some(len) = declared_len {
        if len > limit as u64 {
            return Err(BodyError::TooLarge { limit });
        }
    }

    let capacity = declared_len.map(|len| len as usize).unwrap_or(0);
    let mut buf = BytesMut::with_capacity(capacity);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BodyError::Read(e.into()))?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}
