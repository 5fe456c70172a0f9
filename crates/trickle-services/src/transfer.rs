//! Peer transfer endpoint: direct TCP file streaming between peers.
//!
//! The requester connects, sends the filename as the whole first message
//! (no length prefix), and then reads until the server closes. The server
//! writes the file's bytes and closes. If the file is missing the server
//! closes without writing anything, so the requester ends up with an empty
//! file; the serving side logs a warning.

use std::ffi::OsStr;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Largest filename request read from a connection.
const MAX_FILENAME_LEN: usize = 1024;

/// A peer's listener for inbound transfer requests.
pub struct TransferEndpoint {
    listener: TcpListener,
    share_dir: PathBuf,
}

impl TransferEndpoint {
    /// Bind to an OS-assigned port on `host`. Files are served from `share_dir`.
    pub async fn bind(host: IpAddr, share_dir: PathBuf) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(host, 0))
            .await
            .with_context(|| format!("failed to bind transfer listener on {host}"))?;
        Ok(Self {
            listener,
            share_dir,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("transfer listener has no local address")
    }

    /// Accept connections forever, one task per connection.
    ///
    /// Runs until the task is aborted.
    pub async fn run(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, dir = %self.share_dir.display(), "transfer endpoint listening");
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "transfer accept failed");
                    continue;
                }
            };
            let share_dir = self.share_dir.clone();
            tokio::spawn(async move {
                match serve_connection(stream, &share_dir).await {
                    Ok(bytes) => tracing::debug!(peer = %peer, bytes, "transfer connection closed"),
                    Err(e) => tracing::warn!(peer = %peer, error = %e, "transfer failed"),
                }
            });
        }
    }
}

/// Handle one inbound request. Returns the number of bytes sent.
pub async fn serve_connection(mut stream: TcpStream, share_dir: &Path) -> Result<u64> {
    let mut buf = vec![0u8; MAX_FILENAME_LEN];
    let len = stream
        .read(&mut buf)
        .await
        .context("failed to read filename")?;
    if len == 0 {
        return Ok(0);
    }
    let filename = String::from_utf8_lossy(&buf[..len]).into_owned();

    if !is_plain_file_name(&filename) {
        tracing::warn!(filename = %filename, "refusing transfer of non-plain filename");
        return Ok(0);
    }

    let path = share_dir.join(&filename);
    let mut file = match File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(filename = %filename, "requested file does not exist, closing empty");
            return Ok(0);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let sent = tokio::io::copy(&mut file, &mut stream)
        .await
        .with_context(|| format!("failed to stream {filename}"))?;
    stream.shutdown().await.ok();

    tracing::info!(filename = %filename, bytes = sent, "file sent");
    Ok(sent)
}

/// Download `filename` from the peer at `peer` into `dest_dir`.
/// Returns the path written and its length.
pub async fn fetch_file(peer: SocketAddr, filename: &str, dest_dir: &Path) -> Result<(PathBuf, u64)> {
    if !is_plain_file_name(filename) {
        bail!("refusing to download to non-plain filename {filename:?}");
    }

    let mut stream = TcpStream::connect(peer)
        .await
        .with_context(|| format!("failed to connect to peer at {peer}"))?;
    stream
        .write_all(filename.as_bytes())
        .await
        .context("failed to send filename")?;

    let path = dest_dir.join(filename);
    let mut file = File::create(&path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    let received = tokio::io::copy(&mut stream, &mut file)
        .await
        .with_context(|| format!("failed to receive {filename}"))?;
    file.flush().await?;

    tracing::info!(filename, bytes = received, peer = %peer, "file downloaded");
    Ok((path, received))
}

/// A single path component naming a file: no separators, no `.` or `..`.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && Path::new(name).file_name() == Some(OsStr::new(name))
}
