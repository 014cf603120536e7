//! Rewards Monitor - multi-account rewards dashboard
//!
//! Polls a rewards service for every configured bearer token, optionally
//! through per-account proxies, and keeps a live table of status and points.

pub mod config;
pub mod core;
pub mod tui;

#[cfg(test)]
mod tests;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
