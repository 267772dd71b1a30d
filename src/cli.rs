// src/cli.rs
// =============================================================================
// This file defines how the server is configured, using the `clap` crate.
//
// Every setting can come from a command-line flag OR an environment variable
// (thanks to clap's `env` feature), and falls back to a hard-coded default:
//
//   import-resolver --default-org acme
//   IMPORT_ORG=acme import-resolver
//
// The parsed Cli is turned into a plain Settings value, which is what the
// rest of the program uses. Tests build Settings directly.
// =============================================================================

use crate::locator::Defaults;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_ORG: &str = "importpw";
pub const DEFAULT_REPO: &str = "import";
pub const DEFAULT_REF: &str = "master";
pub const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_AVATAR_HOST: &str = "https://github.com";

#[derive(Parser, Debug)]
#[command(
    name = "import-resolver",
    version,
    about = "Serves /org/repo@ref URLs as raw files from GitHub",
    long_about = "import-resolver turns short URLs like /acme/widget@v2 into the raw contents of \
                  a file on raw.githubusercontent.com, caching the results in memory."
)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Org used when the URL doesn't name one
    #[arg(long, env = "IMPORT_ORG", default_value = DEFAULT_ORG)]
    pub default_org: String,

    /// Repo used when the URL doesn't name one
    #[arg(long, env = "IMPORT_REPO", default_value = DEFAULT_REPO)]
    pub default_repo: String,

    /// Branch used when the URL has no "@ref" suffix
    #[arg(long, env = "IMPORT_REF", default_value = DEFAULT_REF)]
    pub default_ref: String,

    /// Base URL of the raw-file host
    #[arg(long, env = "IMPORT_RAW_HOST", default_value = DEFAULT_RAW_HOST)]
    pub raw_host: String,

    /// Base URL for avatars (favicon) and "View on GitHub" links
    #[arg(long, env = "IMPORT_AVATAR_HOST", default_value = DEFAULT_AVATAR_HOST)]
    pub avatar_host: String,

    /// Total bytes the cache may hold (e.g. 10mb, 512kb, 1048576)
    #[arg(long, env = "IMPORT_CACHE_SIZE", default_value = "10mb", value_parser = parse_byte_size)]
    pub cache_size: usize,

    /// Largest file we are willing to read from upstream
    #[arg(long, env = "IMPORT_BODY_LIMIT", default_value = "1mb", value_parser = parse_byte_size)]
    pub body_limit: usize,

    /// Seconds before an upstream request is abandoned
    #[arg(long, env = "IMPORT_FETCH_TIMEOUT", default_value_t = 30)]
    pub fetch_timeout: u64,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            listen: self.listen,
            defaults: Defaults {
                org: self.default_org.clone(),
                repo: self.default_repo.clone(),
                git_ref: self.default_ref.clone(),
            },
            raw_host: self.raw_host.clone(),
            avatar_host: self.avatar_host.trim_end_matches('/').to_string(),
            cache_size: self.cache_size,
            body_limit: self.body_limit,
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
        }
    }
}

// Resolved configuration, shared by every request
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    pub defaults: Defaults,
    pub raw_host: String,
    pub avatar_host: String,
    pub cache_size: usize,
    pub body_limit: usize,
    pub fetch_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            defaults: Defaults {
                org: DEFAULT_ORG.to_string(),
                repo: DEFAULT_REPO.to_string(),
                git_ref: DEFAULT_REF.to_string(),
            },
            raw_host: DEFAULT_RAW_HOST.to_string(),
            avatar_host: DEFAULT_AVATAR_HOST.to_string(),
            cache_size: 10 * 1024 * 1024,
            body_limit: 1024 * 1024,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

// Parses human-readable sizes: "1048576", "512kb", "10MB", "1gb"
//
// Units are 1024-based. Returns a String error because that's what clap
// shows the user.
fn parse_byte_size(value: &str) -> Result<usize, String> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let number: usize = digits
        .parse()
        .map_err(|_| format!("invalid byte size: {:?}", value))?;

    let multiplier: usize = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit: {:?}", other)),
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("byte size too large: {:?}", value))
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does env = "IMPORT_ORG" do?
//    - If --default-org isn't passed, clap looks at the IMPORT_ORG variable
//    - If that isn't set either, default_value is used
//
// 2. What is value_parser?
//    - A function clap calls to turn the raw string into our type
//    - Here it lets "10mb" become 10485760
//
// 3. Why a separate Settings struct?
//    - Cli is about HOW values arrive (flags, env vars)
//    - Settings is just the values, easy to build by hand in tests
// -----------------------------------------------------------------------------
