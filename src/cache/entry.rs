// src/cache/entry.rs
// =============================================================================
// What we keep for every resolved file.
//
// Only three upstream headers ever make it into a cache entry (and from
// there into our response): Content-Type, ETag and Content-Location. They
// live in a fixed struct rather than a header map, so an arbitrary upstream
// header can never be forwarded by accident.
//
// Also here: turning the upstream Expires header into a time-to-live.
// =============================================================================

use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// The allow-listed response headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedHeaders {
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// The URL the file was finally served from (after upstream redirects)
    pub content_location: Option<String>,
}

impl ForwardedHeaders {
    // (header name, value) pairs for the headers that are present
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("content-type", self.content_type.as_deref()),
            ("etag", self.etag.as_deref()),
            ("content-location", self.content_location.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

// One cached upstream response.
//
// Built once on a cache miss and never modified after it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: ForwardedHeaders,
    pub body: Bytes,
    /// Filled in by the cache when the entry is stored. None = never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(status: u16, headers: ForwardedHeaders, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            expires_at: None,
        }
    }

    /// How much of the cache budget this entry uses
    pub fn weight(&self) -> usize {
        self.body.len()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

// Time-to-live derived from an upstream `Expires` header
//
// Returns None only when there is no header; the entry then lives until it is
// evicted. A header we can't read as a date ("0", "-1", garbage) counts as
// already expired. The result may be zero or negative, in which case the
// entry is stored already expired.
//
// Accepted date formats:
//   IMF-fixdate / RFC 2822   "Wed, 21 Oct 2015 07:28:00 GMT"
//   RFC 850 (obsolete)       "Wednesday, 21-Oct-15 07:28:00 GMT"
//   asctime                  "Wed Oct 21 07:28:00 2015"
//
// Example:
//   now = 07:28:00, Expires: "Wed, 21 Oct 2015 07:33:00 GMT" -> Some(5 minutes)
pub fn ttl_from_expires(expires: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
    let ttl = match parse_http_date(expires?.trim()) {
        Some(expires) => expires - now,
        None => Duration::zero(),
    };
    Some(ttl)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }

    [RFC_850_FORMAT, ASCTIME_FORMAT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

const RFC_850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";
