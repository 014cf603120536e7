//! In-memory account registry.
//!
//! Accounts are identified by their position in the token list. The refresh
//! runner is the only writer; renderers work from [`AccountView`] copies.

use chrono::{DateTime, Local};

use crate::core::client::{Profile, Stats};
use crate::core::proxy::{self, Proxy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountStatus {
    #[default]
    Initializing,
    Connected,
    Error,
}

impl AccountStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Connected => "Connected",
            Self::Error => "Error",
        }
    }
}

/// One tracked account.
#[derive(Debug, Clone)]
pub struct Account {
    token: String,
    proxy: Option<Proxy>,
    pub status: AccountStatus,
    pub username: Option<String>,
    pub email: Option<String>,
    pub points_today: f64,
    pub total_points: f64,
    pub last_update: Option<DateTime<Local>>,
}

impl Account {
    pub fn new(token: impl Into<String>, proxy: Option<Proxy>) -> Self {
        Self {
            token: token.into(),
            proxy,
            status: AccountStatus::Initializing,
            username: None,
            email: None,
            points_today: 0.0,
            total_points: 0.0,
            last_update: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Profile is fetched until both fields are known.
    pub fn needs_profile(&self) -> bool {
        self.username.is_none() || self.email.is_none()
    }

    /// Cache the profile. Values already known are kept.
    pub fn set_profile(&mut self, profile: Profile) {
        self.username.get_or_insert(profile.username);
        self.email.get_or_insert(profile.email);
    }

    pub fn record_success(&mut self, stats: Stats, at: DateTime<Local>) {
        self.status = AccountStatus::Connected;
        self.points_today = stats.points_today;
        self.total_points = stats.total_points;
        self.last_update = Some(at);
    }

    /// Mark the attempt failed. Cached profile and points are left alone.
    pub fn record_failure(&mut self, at: DateTime<Local>) {
        self.status = AccountStatus::Error;
        self.last_update = Some(at);
    }

    pub fn view(&self, index: usize, token_prefix_len: usize) -> AccountView {
        AccountView {
            index,
            masked_token: mask_token(&self.token, token_prefix_len),
            username: self.username.clone(),
            email: self.email.clone(),
            proxy: self.proxy.as_ref().map(Proxy::endpoint),
            status: self.status,
            points_today: self.points_today,
            total_points: self.total_points,
            last_update: self.last_update,
        }
    }
}

/// Display copy of an [`Account`] with the token masked.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountView {
    pub index: usize,
    pub masked_token: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// `scheme://host:port`, or `None` for a direct connection.
    pub proxy: Option<String>,
    pub status: AccountStatus,
    pub points_today: f64,
    pub total_points: f64,
    pub last_update: Option<DateTime<Local>>,
}

/// Ordered account list.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

impl AccountRegistry {
    /// One account per token; proxies are assigned round-robin by index.
    /// An empty proxy list means every account runs direct.
    pub fn from_tokens(tokens: Vec<String>, proxies: &[Proxy]) -> Self {
        let accounts = tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| Account::new(token, proxy::assign(proxies, i).cloned()))
            .collect();
        Self { accounts }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Account> {
        self.accounts.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Account> {
        self.accounts.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn views(&self, token_prefix_len: usize) -> Vec<AccountView> {
        self.accounts
            .iter()
            .enumerate()
            .map(|(i, a)| a.view(i, token_prefix_len))
            .collect()
    }
}

/// First `prefix_len` characters followed by `...`.
pub fn mask_token(token: &str, prefix_len: usize) -> String {
    let prefix: String = token.chars().take(prefix_len).collect();
    format!("{prefix}...")
}
