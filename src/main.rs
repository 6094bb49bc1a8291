//! mail-context-mcp-rs: mailbox consolidation MCP server
//!
//! Searches an IMAP mailbox, consolidates the newest matching messages into
//! bounded text records, and renders selected records as context for a
//! language model. Access is read-only and TLS-only.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and transport selection
//! - [`config`]: Environment-driven configuration for accounts and pipeline settings
//! - [`errors`]: Application error model with MCP error mapping
//! - [`imap`]: IMAP transport/session operations with timeout wrappers
//! - [`store`]: Message store trait and its IMAP adapter
//! - [`query`]: Filter criteria to IMAP SEARCH planning
//! - [`ordering`]: Deterministic ordering and capping of search results
//! - [`dates`]: Tiered date resolution
//! - [`attachments`]: Attachment text extraction
//! - [`mime`]: Message parsing, body selection, and HTML flattening
//! - [`summarize`]: Per-message consolidation into bounded records
//! - [`pipeline`]: End-to-end consolidation over an injected store
//! - [`render`]: Reference list and model context rendering
//! - [`server`]: MCP tool handlers with validation
//! - [`models`]: Input/output DTOs and schema-bearing types

mod attachments;
mod config;
mod dates;
mod errors;
mod imap;
mod mime;
mod models;
mod ordering;
mod pipeline;
mod query;
mod render;
mod server;
mod store;
mod summarize;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::{Parser, ValueEnum};
use config::ServerConfig;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::server::MailContextServer;

/// MCP transport to serve on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Parser)]
#[command(version, about = "Mailbox consolidation MCP server")]
struct Args {
    /// Transport to serve MCP on
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,
    /// Listen address for the HTTP transport
    #[arg(long, default_value = "127.0.0.1:8808")]
    bind: SocketAddr,
}

/// Application entry point
///
/// Initializes tracing from environment, loads config, and serves the MCP
/// server over the selected transport. Tracing always writes to stderr so
/// stdout stays reserved for the stdio transport.
///
/// # Environment Variables
///
/// See [`ServerConfig::load_from_env`] for full configuration options.
///
/// # Example
///
/// ```no_run
/// MAIL_IMAP_DEFAULT_HOST=imap.example.com \
/// MAIL_IMAP_DEFAULT_USER=user@example.com \
/// MAIL_IMAP_DEFAULT_PASS=secret \
/// cargo run -- --transport http --bind 127.0.0.1:8808
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Arc::new(ServerConfig::load_from_env()?);

    match args.transport {
        Transport::Stdio => {
            let service = MailContextServer::new(config).serve(stdio()).await?;
            service.waiting().await?;
        }
        Transport::Http => serve_http(config, args.bind).await?,
    }
    Ok(())
}

/// Serve streamable HTTP until Ctrl-C
async fn serve_http(
    config: Arc<ServerConfig>,
    bind: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    let app = build_router(config);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "serving MCP over HTTP at /mcp");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        }
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    tracing::info!("HTTP transport stopped");
    Ok(())
}

/// HTTP routes: MCP at `/mcp`, liveness at `/healthz`
fn build_router(config: Arc<ServerConfig>) -> Router {
    let mcp = StreamableHttpService::new(
        move || Ok(MailContextServer::new(Arc::clone(&config))),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    Router::new()
        .nest_service("/mcp", mcp)
        .route("/healthz", get(healthz))
}

async fn healthz() -> &'static str {
    "ok"
}
