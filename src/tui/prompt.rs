//! Startup prompts.

use std::io;

use console::{style, Term};

/// Parse a yes/no answer. Empty input takes `default`; anything
/// unrecognised is `None` so the caller can ask again.
pub fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Ask a yes/no question until a valid answer is given.
pub fn confirm(term: &Term, question: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        term.write_str(&format!("{} {} ", style(question).cyan().bold(), hint))?;
        let answer = term.read_line()?;
        if let Some(value) = parse_yes_no(&answer, default) {
            return Ok(value);
        }
        term.write_line(&format!("{}", style("Please answer y or n.").yellow()))?;
    }
}

/// Ask whether to route accounts through the proxy list.
pub fn ask_use_proxies(term: &Term) -> io::Result<bool> {
    confirm(term, "Use proxies from the proxy file?", false)
}

/// One-time warning shown before proxying. The service sits behind an
/// anti-bot challenge that flags many proxy exits, so requests are more
/// likely to fail. Returns `false` if the operator backs out.
pub fn acknowledge_proxy_risk(term: &Term) -> io::Result<bool> {
    term.write_line(&format!(
        "{} {}",
        style("[!]").yellow(),
        style("The service uses a bot challenge; proxied requests fail more often.")
            .yellow()
            .bold()
    ))?;
    confirm(term, "Continue with proxies?", true)
}
