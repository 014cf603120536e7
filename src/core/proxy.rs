//! Proxy connection strings.
//!
//! A proxy line has the form `scheme://[user:password@]host:port`. Parsing is
//! purely syntactic: the scheme is lower-cased and kept as text, and only
//! checked against the supported set when a transport is built for it
//! (see [`Proxy::kind`]).

use std::fmt;

use crate::core::error::{ConfigError, ParseError};

/// Transport family a proxy tunnels through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Socks4,
    Socks5,
    Http,
    Https,
}

impl ProxyKind {
    pub fn from_scheme(scheme: &str) -> Result<Self, ConfigError> {
        match scheme.to_ascii_lowercase().as_str() {
            "socks4" => Ok(Self::Socks4),
            "socks5" => Ok(Self::Socks5),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }
}

/// Username/password pair for an authenticated proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Parsed proxy descriptor. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    /// Lower-cased scheme, as written in the source line.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub auth: Option<ProxyAuth>,
}

impl Proxy {
    /// Parse a single proxy line.
    ///
    /// Credentials missing either half (`http://onlyuser@host:8080`) are
    /// dropped rather than rejected, and the proxy is used without auth.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();

        let (scheme, rest) = line
            .split_once("://")
            .ok_or_else(|| ParseError::invalid_proxy(line, "missing '://' scheme separator"))?;
        if scheme.is_empty() {
            return Err(ParseError::invalid_proxy(line, "empty scheme"));
        }

        // Last '@' so passwords may contain '@'.
        let (credentials, host_port) = match rest.rsplit_once('@') {
            Some((creds, host_port)) => (Some(creds), host_port),
            None => (None, rest),
        };

        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| ParseError::invalid_proxy(line, "missing port"))?;
        if host.is_empty() {
            return Err(ParseError::invalid_proxy(line, "empty host"));
        }
        if port.is_empty() {
            return Err(ParseError::invalid_proxy(line, "empty port"));
        }
        let port = match port.parse::<u16>() {
            Ok(p) if p > 0 => p,
            _ => {
                return Err(ParseError::invalid_proxy(
                    line,
                    format!("port '{port}' is not a positive integer"),
                ))
            }
        };

        let auth = credentials.and_then(|creds| match creds.split_once(':') {
            Some((user, pass)) if !user.is_empty() && !pass.is_empty() => Some(ProxyAuth {
                username: user.to_string(),
                password: pass.to_string(),
            }),
            _ => None,
        });

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_string(),
            port,
            auth,
        })
    }

    /// Resolve the scheme to a supported transport family.
    pub fn kind(&self) -> Result<ProxyKind, ConfigError> {
        ProxyKind::from_scheme(&self.scheme)
    }

    /// Full connection URL, credentials included.
    pub fn url(&self) -> String {
        match &self.auth {
            Some(auth) => format!(
                "{}://{}:{}@{}:{}",
                self.scheme, auth.username, auth.password, self.host, self.port
            ),
            None => self.endpoint(),
        }
    }

    /// `scheme://host:port` without credentials; safe to display and log.
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint())
    }
}

impl std::str::FromStr for Proxy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Proxy for the account at `index` when proxies are reused round-robin.
pub fn assign(proxies: &[Proxy], index: usize) -> Option<&Proxy> {
    if proxies.is_empty() {
        None
    } else {
        proxies.get(index % proxies.len())
    }
}
