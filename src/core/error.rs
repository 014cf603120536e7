//! Error types for the rewards monitor.
//!
//! Each failure site has its own enum so callers can branch on the kind of
//! failure instead of matching on message text:
//!
//! - [`ParseError`]: malformed startup input (fatal).
//! - [`ConfigError`]: an account's proxy cannot be turned into a transport
//!   (fatal for that account's iteration only).
//! - [`RequestError`]: transport, HTTP status, or payload failures
//!   (recoverable, retried next cycle).

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Malformed or missing startup input.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    /// A proxy line could not be parsed.
    #[error("invalid proxy line '{line}': {reason}")]
    #[diagnostic(
        code("MONITOR::PROXY_LINE"),
        help("expected scheme://[user:password@]host:port")
    )]
    InvalidProxy { line: String, reason: String },

    /// A required input file does not exist.
    #[error("input file not found: {}", path.display())]
    #[diagnostic(code("MONITOR::MISSING_FILE"))]
    MissingFile { path: PathBuf },

    /// An input file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    #[diagnostic(code("MONITOR::UNREADABLE"))]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The token file contains no usable lines.
    #[error("no tokens found in {}", path.display())]
    #[diagnostic(
        code("MONITOR::NO_TOKENS"),
        help("add one bearer token per line; blank lines are ignored")
    )]
    NoTokens { path: PathBuf },
}

impl ParseError {
    pub fn invalid_proxy(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProxy {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

/// A transport could not be configured for an account.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// Proxy scheme is not one of socks4, socks5, http, https.
    #[error("unsupported proxy scheme '{scheme}'")]
    #[diagnostic(
        code("MONITOR::PROXY_SCHEME"),
        help("supported schemes: socks4, socks5, http, https")
    )]
    UnsupportedScheme { scheme: String },

    /// The HTTP client rejected the proxy or failed to initialise.
    #[error("failed to build HTTP client: {0}")]
    #[diagnostic(code("MONITOR::CLIENT_BUILD"))]
    ClientBuild(#[source] reqwest::Error),

    /// A header value could not be encoded.
    #[error("invalid header value: {0}")]
    #[diagnostic(code("MONITOR::HEADER"))]
    InvalidHeader(String),

    /// No account is registered at this position.
    #[error("no account at index {index}")]
    #[diagnostic(code("MONITOR::UNKNOWN_ACCOUNT"))]
    UnknownAccount { index: usize },
}

/// A single call to the remote service failed.
#[derive(Debug, Error, Diagnostic)]
pub enum RequestError {
    /// Connection, TLS, proxy tunnel, or body read failure.
    #[error("transport error: {0}")]
    #[diagnostic(code("MONITOR::TRANSPORT"))]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    #[diagnostic(code("MONITOR::STATUS"))]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("unexpected payload: {0}")]
    #[diagnostic(code("MONITOR::PAYLOAD"))]
    Payload(String),
}

impl RequestError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }
}

/// Discriminant of a [`MonitorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Config,
    Request,
}

/// Umbrella error for everything the monitor can fail with.
#[derive(Debug, Error, Diagnostic)]
pub enum MonitorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Request(#[from] RequestError),
}

impl MonitorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Config(_) => ErrorKind::Config,
            Self::Request(_) => ErrorKind::Request,
        }
    }

    /// Request failures are retried on the next cycle; the rest are not
    /// expected to change without operator action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(RequestError::Transport(err))
    }
}
