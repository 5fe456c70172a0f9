//! Interactive user commands.

use std::fmt;

/// A command typed at the peer prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Get(String),
    ListActive,
    ListPublished,
    Publish(String),
    Search(String),
    Unpublish(String),
    Exit,
}

pub const AVAILABLE_COMMANDS: &str = "get, lap, lpf, pub, sch, unp, xit";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Unknown command. Available commands: {}", AVAILABLE_COMMANDS)]
    Unknown,
}

impl UserCommand {
    /// Parse one input line. Verbs are lowercase and matched exactly; file
    /// arguments run to the end of the line.
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let with_arg = |usage: &'static str, build: fn(String) -> UserCommand| {
            if arg.is_empty() {
                Err(UsageError::Usage(usage))
            } else {
                Ok(build(arg.to_string()))
            }
        };
        let bare = |usage: &'static str, cmd: UserCommand| {
            if arg.is_empty() {
                Ok(cmd)
            } else {
                Err(UsageError::Usage(usage))
            }
        };

        match verb {
            "get" => with_arg("get <filename>", UserCommand::Get),
            "pub" => with_arg("pub <filename>", UserCommand::Publish),
            "sch" => with_arg("sch <substring>", UserCommand::Search),
            "unp" => with_arg("unp <filename>", UserCommand::Unpublish),
            "lap" => bare("lap", UserCommand::ListActive),
            "lpf" => bare("lpf", UserCommand::ListPublished),
            "xit" => bare("xit", UserCommand::Exit),
            _ => Err(UsageError::Unknown),
        }
    }
}

impl fmt::Display for UserCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserCommand::Get(name) => write!(f, "get {name}"),
            UserCommand::ListActive => f.write_str("lap"),
            UserCommand::ListPublished => f.write_str("lpf"),
            UserCommand::Publish(name) => write!(f, "pub {name}"),
            UserCommand::Search(sub) => write!(f, "sch {sub}"),
            UserCommand::Unpublish(name) => write!(f, "unp {name}"),
            UserCommand::Exit => f.write_str("xit"),
        }
    }
}
