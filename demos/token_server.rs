//! Token server
//!
//! Serves `/token`, `/getOrCreateRoom` and `/completeRoom` using the vendor
//! credentials in a JSON file keyed by environment.
//!
//! ```text
//! cargo run --example token_server -- --credentials credentials.json --bind 0.0.0.0:3002
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use roomlens::DebugLogger;
use roomlens_token::{TokenServer, TokenServerConfig, MAX_TOKEN_TTL_SECS};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "token_server", about = "Access-token and room provisioning service")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "ROOMLENS_BIND", default_value = "0.0.0.0:3002")]
    bind: SocketAddr,

    /// Vendor credentials file
    #[arg(long, env = "ROOMLENS_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Environment used when a request names none
    #[arg(long, env = "ROOMLENS_ENVIRONMENT", default_value = "prod")]
    environment: String,

    /// Lifetime of issued tokens in seconds
    #[arg(long, env = "ROOMLENS_TOKEN_TTL", default_value_t = MAX_TOKEN_TTL_SECS)]
    token_ttl: u64,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "ROOMLENS_LOG", default_value = "info,tower_http=debug")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    DebugLogger::new(args.log.clone()).init()?;

    let config = TokenServerConfig {
        bind_addr: args.bind,
        credentials_path: args.credentials,
        default_environment: args.environment,
        max_token_ttl: args.token_ttl,
    };
    let server = TokenServer::new(config).context("failed to prepare token server")?;
    let listener = server.bind().await?;

    println!("🚀 Token server running on {}", listener.local_addr()?);
    server
        .serve_on(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            println!("🛑 Shutting down");
        })
        .await?;
    Ok(())
}
