//! Credential and proxy list loading.
//!
//! Both sources are line-oriented text files; blank lines are skipped.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use crate::core::error::ParseError;
use crate::core::proxy::Proxy;

fn read_lines(path: &Path) -> Result<Vec<String>, ParseError> {
    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ParseError::MissingFile {
            path: path.to_path_buf(),
        },
        _ => ParseError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Load bearer tokens, one per line. An empty file is fatal.
pub fn load_tokens(path: &Path) -> Result<Vec<String>, ParseError> {
    let tokens = read_lines(path)?;
    if tokens.is_empty() {
        return Err(ParseError::NoTokens {
            path: path.to_path_buf(),
        });
    }
    info!(count = tokens.len(), path = %path.display(), "Loaded tokens");
    Ok(tokens)
}

/// Load proxy descriptors, one per line.
///
/// A missing file is not an error: every account runs direct. A malformed
/// line is.
pub fn load_proxies(path: &Path) -> Result<Vec<Proxy>, ParseError> {
    let lines = match read_lines(path) {
        Ok(lines) => lines,
        Err(ParseError::MissingFile { .. }) => {
            warn!(path = %path.display(), "Proxy file not found, using direct connections");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let proxies = lines
        .iter()
        .map(|line| Proxy::parse(line))
        .collect::<Result<Vec<_>, _>>()?;

    if proxies.is_empty() {
        warn!(path = %path.display(), "Proxy file is empty, using direct connections");
    } else {
        info!(count = proxies.len(), path = %path.display(), "Loaded proxies");
    }
    Ok(proxies)
}
