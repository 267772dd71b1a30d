// src/locator/mod.rs
// =============================================================================
// This module turns a short request path into a Locator.
//
// A Locator is the (org, repo, ref, file) tuple that names one file in one
// GitHub repository. Everything downstream (the fetcher, the cache) works
// on Locators, never on raw request paths.
//
// Submodules:
// - parse: the path grammar and the Locator type itself
//
// Rust concepts:
// - Modules: Organizing related functionality
// - pub use: Re-exporting so callers write `locator::parse`
// =============================================================================

mod parse;

pub use parse::{parse, CacheKey, Defaults, Locator, ParseError};
