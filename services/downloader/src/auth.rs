//! Earthdata Login credentials from a netrc file.
//!
//! The file holds `machine <host> login <user> password <secret>` stanzas,
//! optionally followed by a `default` stanza used when no machine matches.
//! Values may be double-quoted to hold whitespace, with `\` escaping the next
//! character. `macdef` blocks are skipped up to the next blank line.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Identity provider that issues download cookies for LP DAAC assets.
pub const EARTHDATA_LOGIN_HOST: &str = "urs.earthdata.nasa.gov";

/// Username and password for one host.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct NetrcError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NetrcEntry {
    login: Option<String>,
    password: Option<String>,
}

/// Parsed netrc contents.
#[derive(Debug, Clone, Default)]
pub struct Netrc {
    machines: Vec<(String, NetrcEntry)>,
    default: Option<NetrcEntry>,
}

enum Stanza {
    Machine(String),
    Default,
}

/// Split one line into tokens. An unquoted token starting with `#` ends the line.
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        if first == '#' {
            break;
        }

        let mut token = String::new();
        if first == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some(c) => token.push(c),
                        None => return Err("unterminated quoted token".to_string()),
                    },
                    Some(c) => token.push(c),
                    None => return Err("unterminated quoted token".to_string()),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

impl Netrc {
    pub fn parse(content: &str) -> Result<Self, NetrcError> {
        let mut netrc = Netrc::default();
        let mut current: Option<(Stanza, NetrcEntry)> = None;
        let mut lines = content.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let line_no = index + 1;
            let err = |message: String| NetrcError {
                line: line_no,
                message,
            };
            let mut tokens = tokenize(line).map_err(&err)?.into_iter();

            while let Some(token) = tokens.next() {
                match token.as_str() {
                    "machine" => {
                        netrc.close(current.take());
                        let host = tokens
                            .next()
                            .ok_or_else(|| err("machine without a host name".to_string()))?;
                        current = Some((Stanza::Machine(host), NetrcEntry::default()));
                    }
                    "default" => {
                        netrc.close(current.take());
                        current = Some((Stanza::Default, NetrcEntry::default()));
                    }
                    "login" | "password" | "account" => {
                        let value = tokens
                            .next()
                            .ok_or_else(|| err(format!("{token} without a value")))?;
                        let (_, entry) = current
                            .as_mut()
                            .ok_or_else(|| err(format!("{token} outside a machine stanza")))?;
                        match token.as_str() {
                            "login" => entry.login = Some(value),
                            "password" => entry.password = Some(value),
                            _ => {}
                        }
                    }
                    "macdef" => {
                        netrc.close(current.take());
                        for (_, body) in lines.by_ref() {
                            if body.trim().is_empty() {
                                break;
                            }
                        }
                        break;
                    }
                    other => return Err(err(format!("unexpected token {other:?}"))),
                }
            }
        }

        netrc.close(current);
        Ok(netrc)
    }

    fn close(&mut self, stanza: Option<(Stanza, NetrcEntry)>) {
        match stanza {
            Some((Stanza::Machine(host), entry)) => self.machines.push((host, entry)),
            Some((Stanza::Default, entry)) => self.default = Some(entry),
            None => {}
        }
    }

    /// Credentials for `host`, falling back to the `default` stanza.
    ///
    /// When a host appears more than once the last stanza wins. Returns `None`
    /// when no stanza applies or it lacks a login or password.
    pub fn credentials_for(&self, host: &str) -> Option<Credentials> {
        let entry = self
            .machines
            .iter()
            .rev()
            .find(|(machine, _)| machine.eq_ignore_ascii_case(host))
            .map(|(_, entry)| entry)
            .or(self.default.as_ref())?;

        match (&entry.login, &entry.password) {
            (Some(login), Some(password)) => Some(Credentials::new(login, password)),
            _ => None,
        }
    }
}

/// `~/.netrc` for the current user.
pub fn default_netrc_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.netrc").into_owned())
}

#[cfg(unix)]
async fn warn_if_readable_by_others(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = tokio::fs::metadata(path).await {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{:o}", mode & 0o777),
                "netrc file is accessible by other users; chmod 600 is recommended"
            );
        }
    }
}

#[cfg(not(unix))]
async fn warn_if_readable_by_others(_path: &Path) {}

/// Read `path` and return the credentials it holds for `host`.
///
/// Any problem (missing file, unreadable file, parse error, no matching
/// stanza) is reported as [`FetchError::NotAuthenticated`] so the run can stop
/// before a single request is issued.
pub async fn resolve_credentials(path: &Path, host: &str) -> Result<Credentials, FetchError> {
    let not_authenticated = |reason: String| FetchError::NotAuthenticated {
        host: host.to_string(),
        reason,
    };

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            not_authenticated(format!("{} does not exist", path.display()))
        } else {
            not_authenticated(format!("cannot read {}: {e}", path.display()))
        }
    })?;

    warn_if_readable_by_others(path).await;

    let netrc = Netrc::parse(&content)
        .map_err(|e| not_authenticated(format!("malformed {}: {e}", path.display())))?;

    let credentials = netrc.credentials_for(host).ok_or_else(|| {
        not_authenticated(format!(
            "{} has no login and password for this host",
            path.display()
        ))
    })?;

    debug!(host, username = credentials.username(), "Resolved credentials");
    Ok(credentials)
}
