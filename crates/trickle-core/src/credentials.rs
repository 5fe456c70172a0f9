//! Credential store: immutable username → password table loaded at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read-only credential table.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: HashMap<String, String>,
}

impl CredentialStore {
    /// Parse `username password` lines. The password is everything after the
    /// first run of whitespace, trimmed. Blank lines are skipped; a later
    /// entry for the same username replaces an earlier one.
    pub fn parse(text: &str) -> Result<Self, CredentialError> {
        let mut entries = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((username, password)) = line.split_once(char::is_whitespace) else {
                return Err(CredentialError::MalformedLine(idx + 1));
            };
            entries.insert(username.to_string(), password.trim().to_string());
        }
        Ok(Self { entries })
    }

    /// Load and parse a credentials file.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CredentialError::ReadFailed(path.to_path_buf(), e))?;
        Self::parse(&text)
    }

    pub fn lookup(&self, username: &str) -> Option<&str> {
        self.entries.get(username).map(String::as_str)
    }

    /// True iff `username` exists and `password` matches exactly.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.lookup(username) == Some(password)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<U: Into<String>, P: Into<String>> FromIterator<(U, P)> for CredentialStore {
    fn from_iter<I: IntoIterator<Item = (U, P)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("line {0}: expected `username password`")]
    MalformedLine(usize),
}
