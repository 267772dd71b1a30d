// src/locator/parse.rs
// =============================================================================
// This module parses the short URL grammar:
//
//   /{[org/]repo}[@{ref}]?file={path}
//
// Rules:
// - Everything after the LAST '@' in the path is the ref
// - What remains is split on '/' after stripping the leading slash
//   0 or 1 segment  -> repo (org defaults)
//   2 segments      -> org/repo
//   more            -> error, carrying the segment count
// - Empty pieces fall back to the configured defaults
// - The file comes from the `file` query parameter, or "{repo}.sh"
//
// This is a pure function: no network, no cache.
//
// Rust concepts:
// - Result<T, E> with a typed error (thiserror)
// - String slicing with rfind()
// - serde_json::json! to build a stable cache key
// =============================================================================

use serde::Serialize;
use std::fmt;
use thiserror::Error;

// The fallback identities used when the path leaves a piece out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub org: String,
    pub repo: String,
    /// Baseline branch name used when there is no "@ref" suffix
    pub git_ref: String,
}

// A fully-resolved pointer to one file in one repository.
//
// Constructed once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Locator {
    pub org: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub file: String,
}

/// The path had more slash-delimited segments than the grammar allows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Expected up to 2 slashes in the URL, but got {count}")]
    TooManySegments { count: usize },
}

// Parses a request path (plus an optional explicit file) into a Locator
//
// Parameters:
//   pathname: the URL path, e.g. "/acme/widget@v2"
//   explicit_file: the `file` query parameter, if any
//   defaults: fallback org / repo / ref
//
// Example:
//   parse("/acme/widget@v2", None, ..) ->
//     Locator { org: "acme", repo: "widget", git_ref: "v2", file: "widget.sh" }
pub fn parse(
    pathname: &str,
    explicit_file: Option<&str>,
    defaults: &Defaults,
) -> Result<Locator, ParseError> {
    let mut path = pathname;
    let mut git_ref = defaults.git_ref.clone();

    // Split once on the last '@' so refs like "feature/x" survive intact
    if let Some(at) = path.rfind('@') {
        let suffix = &path[at + 1..];
        if !suffix.is_empty() {
            git_ref = suffix.to_string();
        }
        path = &path[..at];
    }

    let path = path.strip_prefix('/').unwrap_or(path);
    let parts: Vec<&str> = path.split('/').collect();

    let (org, repo) = match parts.as_slice() {
        [repo] => (None, Some(*repo)),
        [org, repo] => (Some(*org), Some(*repo)),
        _ => {
            return Err(ParseError::TooManySegments { count: parts.len() });
        }
    };

    let org = non_empty(org).unwrap_or(&defaults.org).to_string();
    let repo = non_empty(repo).unwrap_or(&defaults.repo).to_string();

    let file = match non_empty(explicit_file) {
        Some(file) => file.to_string(),
        None => format!("{}.sh", repo),
    };

    Ok(Locator {
        org,
        repo,
        git_ref,
        file,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl Locator {
    // The key this locator is cached under.
    //
    // serde_json's default map is ordered by key, so two locators with the
    // same field values always produce the same string.
    pub fn cache_key(&self) -> CacheKey {
        let value = serde_json::json!({
            "org": self.org,
            "repo": self.repo,
            "ref": self.git_ref,
            "file": self.file,
        });
        CacheKey(value.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}/{}", self.org, self.repo, self.git_ref, self.file)
    }
}

/// Serialized form of a Locator, used as the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why match on parts.as_slice()?
//    - Slice patterns like [org, repo] match on length AND bind elements
//    - The `_` arm catches every other length in one place
//
// 2. Why rfind() instead of find()?
//    - rfind() searches from the end, giving us the LAST '@'
//    - Everything after it is the ref, everything before it is the path
//
// 3. What does #[serde(rename = "ref")] do?
//    - `ref` is a Rust keyword, so the field is called git_ref
//    - The rename keeps the serialized name short and familiar
// -----------------------------------------------------------------------------
