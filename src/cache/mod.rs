// src/cache/mod.rs
// =============================================================================
// This module holds fetched files in memory so repeat requests don't have to
// go back to GitHub.
//
// Submodules:
// - entry: what a cached response looks like, plus Expires -> TTL math
// - lru: the byte-bounded, least-recently-used store itself
//
// Nothing is persisted: restart the process and the cache starts empty.
// =============================================================================

mod entry;
mod lru;

pub use entry::{ttl_from_expires, CacheEntry, ForwardedHeaders};
pub use lru::ExpiringCache;
