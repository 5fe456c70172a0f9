//! BitTrickle control protocol: request and reply text as it appears on the wire.
//!
//! Every control message is a single UDP datagram of ASCII text. A request is
//! a command token followed by space-separated positional arguments; filenames
//! and search substrings run to the end of the datagram. Replies are plain text
//! with no envelope. HBT has no reply at all.
//!
//! Command tokens are matched exactly and case-sensitively. Anything that is
//! not one of the known tokens parses to `Request::Unrecognized` rather than an
//! error, so the dispatcher can answer "Invalid command" while still knowing
//! which user (if any) sent it.

use std::fmt;
use std::net::SocketAddr;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Largest datagram either side will read.
pub const MAX_DATAGRAM: usize = 65_507;

/// Default interval between client heartbeats, in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 2_000;

/// Default liveness timeout, in milliseconds.
/// Must exceed the heartbeat interval so one lost heartbeat is tolerated.
pub const LIVENESS_TIMEOUT_MS: u64 = 3_000;

/// Default reaper poll interval, in milliseconds.
pub const REAP_INTERVAL_MS: u64 = 1_000;

// ── Commands ──────────────────────────────────────────────────────────────────

/// The closed set of control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Auth,
    Heartbeat,
    ListActive,
    ListPublished,
    Publish,
    Search,
    Unpublish,
    Get,
    Exit,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Auth,
        Command::Heartbeat,
        Command::ListActive,
        Command::ListPublished,
        Command::Publish,
        Command::Search,
        Command::Unpublish,
        Command::Get,
        Command::Exit,
    ];

    /// The on-wire token for this command.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Auth => "AUTH",
            Command::Heartbeat => "HBT",
            Command::ListActive => "LAP",
            Command::ListPublished => "LPF",
            Command::Publish => "PUB",
            Command::Search => "SCH",
            Command::Unpublish => "UNP",
            Command::Get => "GET",
            Command::Exit => "XIT",
        }
    }

    /// Exact, case-sensitive token match.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == token)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Auth {
        username: String,
        password: String,
        transfer_port: u16,
    },
    Heartbeat { username: String },
    ListActive { username: String },
    ListPublished { username: String },
    Publish { username: String, filename: String },
    Search { username: String, substring: String },
    Unpublish { username: String, filename: String },
    Get { username: String, filename: String },
    Exit { username: String },
    /// First token is not a known command.
    Unrecognized {
        command: String,
        username: Option<String>,
    },
}

impl Request {
    /// Parse a raw datagram.
    pub fn from_datagram(bytes: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(bytes).map_err(|_| WireError::NotUtf8)?;
        Self::parse(text)
    }

    /// Parse request text.
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let (token, rest) = next_token(text);
        if token.is_empty() {
            return Err(WireError::Empty);
        }

        let Some(command) = Command::from_token(token) else {
            let (username, _) = next_token(rest);
            return Ok(Request::Unrecognized {
                command: token.to_string(),
                username: (!username.is_empty()).then(|| username.to_string()),
            });
        };

        match command {
            Command::Auth => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let &[username, password, port] = args.as_slice() else {
                    return Err(WireError::ArgumentCount {
                        command,
                        expected: 3,
                        found: args.len(),
                    });
                };
                let transfer_port = port
                    .parse()
                    .map_err(|_| WireError::InvalidPort(port.to_string()))?;
                Ok(Request::Auth {
                    username: username.to_string(),
                    password: password.to_string(),
                    transfer_port,
                })
            }
            Command::Heartbeat | Command::ListActive | Command::ListPublished | Command::Exit => {
                let username = single_username(command, rest)?;
                Ok(match command {
                    Command::Heartbeat => Request::Heartbeat { username },
                    Command::ListActive => Request::ListActive { username },
                    Command::ListPublished => Request::ListPublished { username },
                    _ => Request::Exit { username },
                })
            }
            Command::Publish | Command::Search | Command::Unpublish | Command::Get => {
                let (username, argument) = username_and_rest(command, rest)?;
                Ok(match command {
                    Command::Publish => Request::Publish {
                        username,
                        filename: argument,
                    },
                    Command::Search => Request::Search {
                        username,
                        substring: argument,
                    },
                    Command::Unpublish => Request::Unpublish {
                        username,
                        filename: argument,
                    },
                    _ => Request::Get {
                        username,
                        filename: argument,
                    },
                })
            }
        }
    }

    /// The command this request carries, or `None` if unrecognized.
    pub fn command(&self) -> Option<Command> {
        match self {
            Request::Auth { .. } => Some(Command::Auth),
            Request::Heartbeat { .. } => Some(Command::Heartbeat),
            Request::ListActive { .. } => Some(Command::ListActive),
            Request::ListPublished { .. } => Some(Command::ListPublished),
            Request::Publish { .. } => Some(Command::Publish),
            Request::Search { .. } => Some(Command::Search),
            Request::Unpublish { .. } => Some(Command::Unpublish),
            Request::Get { .. } => Some(Command::Get),
            Request::Exit { .. } => Some(Command::Exit),
            Request::Unrecognized { .. } => None,
        }
    }

    /// The username the request claims to come from.
    pub fn username(&self) -> Option<&str> {
        match self {
            Request::Auth { username, .. }
            | Request::Heartbeat { username }
            | Request::ListActive { username }
            | Request::ListPublished { username }
            | Request::Publish { username, .. }
            | Request::Search { username, .. }
            | Request::Unpublish { username, .. }
            | Request::Get { username, .. }
            | Request::Exit { username } => Some(username),
            Request::Unrecognized { username, .. } => username.as_deref(),
        }
    }
}

/// Wire encoding. `Request::parse(&req.to_string())` yields `req` back.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Auth {
                username,
                password,
                transfer_port,
            } => write!(f, "AUTH {username} {password} {transfer_port}"),
            Request::Heartbeat { username } => write!(f, "HBT {username}"),
            Request::ListActive { username } => write!(f, "LAP {username}"),
            Request::ListPublished { username } => write!(f, "LPF {username}"),
            Request::Publish { username, filename } => write!(f, "PUB {username} {filename}"),
            Request::Search {
                username,
                substring,
            } => write!(f, "SCH {username} {substring}"),
            Request::Unpublish { username, filename } => write!(f, "UNP {username} {filename}"),
            Request::Get { username, filename } => write!(f, "GET {username} {filename}"),
            Request::Exit { username } => write!(f, "XIT {username}"),
            Request::Unrecognized { command, username } => match username {
                Some(u) => write!(f, "{command} {u}"),
                None => f.write_str(command),
            },
        }
    }
}

/// Split off the first whitespace-delimited token. Returns `(token, rest)`,
/// with `rest` trimmed of leading whitespace.
fn next_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    }
}

fn single_username(command: Command, rest: &str) -> Result<String, WireError> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    match args.as_slice() {
        &[username] => Ok(username.to_string()),
        _ => Err(WireError::ArgumentCount {
            command,
            expected: 1,
            found: args.len(),
        }),
    }
}

fn username_and_rest(command: Command, rest: &str) -> Result<(String, String), WireError> {
    let (username, argument) = next_token(rest);
    let argument = argument.trim_end();
    if username.is_empty() || argument.is_empty() {
        return Err(WireError::ArgumentCount {
            command,
            expected: 2,
            found: usize::from(!username.is_empty()),
        });
    }
    Ok((username.to_string(), argument.to_string()))
}

// ── Replies ───────────────────────────────────────────────────────────────────

pub const REPLY_OK: &str = "OK";
pub const REPLY_AUTH_FAILED: &str = "Authentication failed";
pub const REPLY_ALREADY_ACTIVE: &str = "User already active";
pub const REPLY_UNPUBLISH_FAILED: &str = "File unpublication failed";
pub const REPLY_FILE_NOT_FOUND: &str = "File not found";
pub const REPLY_GOODBYE: &str = "Goodbye";
pub const REPLY_INVALID_COMMAND: &str = "Invalid command";

/// A control reply. `Display` renders the exact wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    AuthenticationFailed,
    UserAlreadyActive,
    ActivePeers(Vec<String>),
    PublishedFiles(Vec<String>),
    Published(String),
    SearchResults(Vec<String>),
    Unpublished(String),
    UnpublishFailed,
    /// Transfer address of the peer that owns a requested file.
    PeerAddress(SocketAddr),
    FileNotFound,
    Goodbye,
    InvalidCommand,
    Malformed(Command),
}

impl Reply {
    /// Whether the transaction is logged as OK rather than ERR.
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Reply::AuthenticationFailed
                | Reply::UserAlreadyActive
                | Reply::UnpublishFailed
                | Reply::FileNotFound
                | Reply::InvalidCommand
                | Reply::Malformed(_)
        )
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str(REPLY_OK),
            Reply::AuthenticationFailed => f.write_str(REPLY_AUTH_FAILED),
            Reply::UserAlreadyActive => f.write_str(REPLY_ALREADY_ACTIVE),
            Reply::ActivePeers(peers) => {
                write_listing(f, peers, "active peer", "active peers", "No active peers")
            }
            Reply::PublishedFiles(files) => {
                write_listing(f, files, "file published", "files published", "No files published")
            }
            Reply::Published(filename) => write!(f, "File {filename} published successfully"),
            Reply::SearchResults(files) => {
                write_listing(f, files, "file found", "files found", "No files found")
            }
            Reply::Unpublished(filename) => write!(f, "File {filename} unpublished successfully"),
            Reply::UnpublishFailed => f.write_str(REPLY_UNPUBLISH_FAILED),
            Reply::PeerAddress(addr) => write!(f, "{addr}"),
            Reply::FileNotFound => f.write_str(REPLY_FILE_NOT_FOUND),
            Reply::Goodbye => f.write_str(REPLY_GOODBYE),
            Reply::InvalidCommand => f.write_str(REPLY_INVALID_COMMAND),
            Reply::Malformed(command) => write!(f, "Malformed {command} request"),
        }
    }
}

/// "N things:\n" + one item per line, singular for exactly one.
fn write_listing(
    f: &mut fmt::Formatter<'_>,
    items: &[String],
    singular: &str,
    plural: &str,
    empty: &str,
) -> fmt::Result {
    match items.len() {
        0 => f.write_str(empty),
        1 => write!(f, "1 {singular}:\n{}", items[0]),
        n => write!(f, "{n} {plural}:\n{}", items.join("\n")),
    }
}

/// Parse the body of a successful GET reply.
pub fn parse_peer_address(text: &str) -> Option<SocketAddr> {
    text.trim().parse().ok()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when parsing a control request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("empty request")]
    Empty,

    #[error("request is not valid UTF-8")]
    NotUtf8,

    #[error("{command} expects {expected} argument(s), found {found}")]
    ArgumentCount {
        command: Command,
        expected: usize,
        found: usize,
    },

    #[error("invalid transfer port: {0:?}")]
    InvalidPort(String),
}

impl WireError {
    /// The recognised command a malformed request was for, if any.
    pub fn command(&self) -> Option<Command> {
        match self {
            WireError::ArgumentCount { command, .. } => Some(*command),
            WireError::InvalidPort(_) => Some(Command::Auth),
            WireError::Empty | WireError::NotUtf8 => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
