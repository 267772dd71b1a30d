// src/main.rs
// =============================================================================
// This is the entry point of the server.
//
// What happens here:
// 1. Parse configuration (flags + environment variables) using clap
// 2. Set up logging with tracing
// 3. Build the shared state: cache + upstream client
// 4. Serve HTTP until the process is stopped
// 5. Exit with code 2 if anything fails on the way up
//
// Rust concepts used:
// - async/await: Every request is a task on the tokio runtime
// - Result<T, E>: For error handling, with anyhow at the top level
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cache; // src/cache/ - in-memory response cache
mod cli; // src/cli.rs - configuration
mod locator; // src/locator/ - short URL parsing
mod server; // src/server/ - HTTP handler
mod upstream; // src/upstream/ - talking to raw.githubusercontent.com

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::Cli;
use server::AppState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<()> {
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();
    init_tracing()?;

    let settings = cli.settings();
    let listen = settings.listen;

    info!(
        org = %settings.defaults.org,
        repo = %settings.defaults.repo,
        git_ref = %settings.defaults.git_ref,
        raw_host = %settings.raw_host,
        body_limit = settings.body_limit,
        "resolver defaults"
    );

    let state = AppState::new(settings).context("failed to set up the upstream client")?;
    info!(capacity = state.cache.capacity(), "cache ready");

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!("listening on http://{}", listen);

    axum::serve(listener, server::router(state)).await?;

    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "import_resolver=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {}", e))
}
