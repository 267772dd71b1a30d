// src/upstream/mod.rs
// =============================================================================
// This module talks to the raw-file host (raw.githubusercontent.com).
//
// Submodules:
// - fetch: builds the upstream URL, sends one GET and classifies the answer
// - body: reads the answer's body into memory with a hard size ceiling
//
// There are no retries anywhere in here. A failed fetch is reported straight
// back to the caller.
// =============================================================================

mod body;
mod fetch;

pub use body::BodyError;
pub use fetch::{FetchError, FetchOutcome, Fetcher};
