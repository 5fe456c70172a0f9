//! trickled: BitTrickle coordination server daemon.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use trickle_core::config::TrickleConfig;
use trickle_core::CredentialStore;
use trickled::{start_server, ServerSettings, TracingJournal};

fn print_usage() {
    println!("Usage: trickled <port> [--credentials <path>]");
    println!();
    println!("Options:");
    println!("  --credentials <path>   username/password file (default: credentials.txt)");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TrickleConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = TrickleConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TrickleConfig::default()
    });

    // Parse arguments: <port> [--credentials <path>]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut port: Option<u16> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--credentials" => {
                i += 1;
                config.server.credentials_path = PathBuf::from(
                    args.get(i).context("--credentials requires a value")?,
                );
            }
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                port = Some(other.parse().context("port must be a number")?);
            }
        }
        i += 1;
    }
    let Some(port) = port.or((config.server.port != 0).then_some(config.server.port)) else {
        print_usage();
        std::process::exit(1);
    };

    let credentials = CredentialStore::load(&config.server.credentials_path)
        .context("failed to load credentials")?;
    tracing::info!(
        users = credentials.len(),
        path = %config.server.credentials_path.display(),
        "credentials loaded"
    );

    let host: IpAddr = config
        .server
        .bind_addr
        .parse()
        .context("server.bind_addr must be an IP address")?;

    let server = start_server(
        SocketAddr::new(host, port),
        ServerSettings::from(&config.server),
        credentials,
        Arc::new(TracingJournal),
    )
    .await?;

    println!("Server is listening on {}", server.local_addr());
    server.run_until_ctrl_c().await
}
