//! trickle-ctl: interactive BitTrickle peer.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use trickle_core::config::TrickleConfig;
use trickle_ctl::command::AVAILABLE_COMMANDS;
use trickle_ctl::{start_client, AuthOutcome, GetOutcome, Peer, PeerSettings, UserCommand};

type Input = Lines<BufReader<Stdin>>;

fn print_usage() {
    println!("Usage: trickle-ctl <server_port> [--host <ip>]");
    println!();
    println!("Options:");
    println!("  --host <ip>   Server host (default: 127.0.0.1)");
}

async fn prompt(input: &mut Input, text: &str) -> Result<Option<String>> {
    print!("{text}");
    std::io::stdout().flush().ok();
    input.next_line().await.context("failed to read stdin")
}

/// Ask for credentials until the server accepts them. `false` on end of input.
async fn authenticate(peer: &mut Peer, input: &mut Input) -> Result<bool> {
    loop {
        let Some(username) = prompt(input, "Enter username: ").await? else {
            return Ok(false);
        };
        let Some(password) = prompt(input, "Enter password: ").await? else {
            return Ok(false);
        };
        match peer.authenticate(username.trim(), password.trim()).await? {
            AuthOutcome::Accepted => {
                println!("Welcome to BitTrickle!");
                println!("Available commands are: {AVAILABLE_COMMANDS}");
                return Ok(true);
            }
            AuthOutcome::Rejected(reason) => {
                tracing::debug!(reason = %reason, "authentication rejected");
                println!("{reason}. Please try again.");
            }
        }
    }
}

async fn run_command(peer: &Peer, command: &UserCommand) -> Result<()> {
    let reply = match command {
        UserCommand::ListActive => peer.list_active_peers().await?,
        UserCommand::ListPublished => peer.list_published().await?,
        UserCommand::Publish(name) => peer.publish(name).await?,
        UserCommand::Search(sub) => peer.search(sub).await?,
        UserCommand::Unpublish(name) => peer.unpublish(name).await?,
        UserCommand::Get(name) => match peer.get(name).await? {
            GetOutcome::NotFound => "File not found".to_string(),
            GetOutcome::Downloaded { path, bytes, .. } => {
                format!("{} downloaded successfully ({bytes} bytes)", path.display())
            }
        },
        UserCommand::Exit => return Ok(()),
    };
    println!("{reply}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = TrickleConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TrickleConfig::default()
    });

    // Parse arguments: <server_port> [--host <ip>]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut server: SocketAddr = config
        .peer
        .server_addr
        .parse()
        .context("peer.server_addr must be host:port")?;
    let mut port_given = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                let host: IpAddr = args
                    .get(i)
                    .context("--host requires a value")?
                    .parse()
                    .context("--host must be an IP address")?;
                server.set_ip(host);
            }
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                server.set_port(other.parse().context("server port must be a number")?);
                port_given = true;
            }
        }
        i += 1;
    }
    if !port_given && server.port() == 0 {
        print_usage();
        std::process::exit(1);
    }

    let settings = PeerSettings::from_config(&config.peer)?;
    let mut peer = start_client(server, settings).await?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    if !authenticate(&mut peer, &mut input).await? {
        return Ok(());
    }

    while let Some(line) = prompt(&mut input, "> ").await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match UserCommand::parse(&line) {
            Ok(c) => c,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if command == UserCommand::Exit {
            break;
        }
        if let Err(e) = run_command(&peer, &command).await {
            println!("Error: {e:#}");
        }
    }

    if let Err(e) = peer.exit().await {
        tracing::warn!(error = %e, "exit notification failed");
    }
    println!("Goodbye!");
    Ok(())
}
