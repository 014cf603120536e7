//! Refresh cycle runner.
//!
//! Each cycle walks the registry in order. Per account:
//!
//! 1. fetch the profile, only while username or email is unknown
//! 2. send the connectivity ping
//! 3. fetch earnings and mark the account connected
//!
//! The first failing step ends that account's turn: it is marked `Error`,
//! its cached values are kept, and the next cycle tries again. A fixed pause
//! follows every account whatever the outcome, and a longer one follows
//! every cycle. Accounts are never processed concurrently.
//!
//! The runner publishes a [`Snapshot`] after every account and every cycle;
//! rendering happens elsewhere. A [`CancellationToken`] stops the loop at
//! the next pause or account boundary.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScheduleConfig;
use crate::core::activity::{ActivityEntry, ActivityLevel, ActivityLog};
use crate::core::client::{RewardsApi, Stats};
use crate::core::error::{ConfigError, MonitorError};
use crate::core::registry::{AccountRegistry, AccountStatus, AccountView};

// =============================================================================
// Pacing
// =============================================================================

pub const DEFAULT_ACCOUNT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(30);

/// Fixed pauses between accounts and between cycles. No backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub account_delay: Duration,
    pub cycle_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            account_delay: DEFAULT_ACCOUNT_DELAY,
            cycle_delay: DEFAULT_CYCLE_DELAY,
        }
    }
}

impl Pacing {
    /// No pauses at all. Used by tests and single-cycle runs against mocks.
    pub fn immediate() -> Self {
        Self {
            account_delay: Duration::ZERO,
            cycle_delay: Duration::ZERO,
        }
    }
}

impl From<&ScheduleConfig> for Pacing {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            account_delay: Duration::from_secs(config.account_delay_secs),
            cycle_delay: Duration::from_secs(config.cycle_delay_secs),
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancel.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

// =============================================================================
// Steps and snapshots
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Profile,
    Ping,
    Stats,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Profile => "profile fetch",
            Self::Ping => "ping",
            Self::Stats => "stats fetch",
        })
    }
}

/// A refresh step that failed, with the step it failed at.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct StepError {
    pub step: Step,
    #[source]
    pub source: MonitorError,
}

impl StepError {
    fn at(step: Step) -> impl FnOnce(MonitorError) -> Self {
        move |source| Self { step, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing { account: usize },
    Sleeping { next_cycle_at: DateTime<Local> },
    Stopped,
}

/// Everything a renderer needs, detached from the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub cycle: u64,
    pub phase: Phase,
    pub accounts: Vec<AccountView>,
    pub activity: Vec<ActivityEntry>,
}

impl Snapshot {
    pub fn count(&self, status: AccountStatus) -> usize {
        self.accounts.iter().filter(|a| a.status == status).count()
    }
}

// =============================================================================
// Runner
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub pacing: Pacing,
    /// Entries kept in the scrolling activity log.
    pub log_capacity: usize,
    /// Token characters shown in snapshots.
    pub token_prefix_len: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            log_capacity: 20,
            token_prefix_len: 8,
        }
    }
}

pub struct RefreshRunner<A> {
    api: A,
    registry: AccountRegistry,
    activity: ActivityLog,
    options: RunnerOptions,
    cycle: u64,
    phase: Phase,
    snapshots: watch::Sender<Snapshot>,
}

impl<A: RewardsApi> RefreshRunner<A> {
    pub fn new(api: A, registry: AccountRegistry, options: RunnerOptions) -> Self {
        let activity = ActivityLog::new(options.log_capacity);
        let initial = Snapshot {
            cycle: 0,
            phase: Phase::Idle,
            accounts: registry.views(options.token_prefix_len),
            activity: activity.to_vec(),
        };
        let (snapshots, _) = watch::channel(initial);
        Self {
            api,
            registry,
            activity,
            options,
            cycle: 0,
            phase: Phase::Idle,
            snapshots,
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cycle: self.cycle,
            phase: self.phase,
            accounts: self.registry.views(self.options.token_prefix_len),
            activity: self.activity.to_vec(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Run steps 1-3 for one account, caching the profile as soon as it is
    /// known. Does not touch status or timestamps.
    async fn refresh_account(&mut self, index: usize) -> Result<Stats, StepError> {
        let Some(account) = self.registry.get(index) else {
            return Err(StepError {
                step: Step::Profile,
                source: ConfigError::UnknownAccount { index }.into(),
            });
        };
        let token = account.token().to_string();
        let proxy = account.proxy().cloned();

        if account.needs_profile() {
            let profile = self
                .api
                .fetch_profile(&token, proxy.clone())
                .await
                .map_err(StepError::at(Step::Profile))?;
            if let Some(account) = self.registry.get_mut(index) {
                account.set_profile(profile);
            }
        }

        self.api
            .ping(&token, proxy.clone())
            .await
            .map_err(StepError::at(Step::Ping))?;

        self.api
            .fetch_stats(&token, proxy)
            .await
            .map_err(StepError::at(Step::Stats))
    }

    /// Refresh one account and record the outcome in the registry and the
    /// activity log.
    pub async fn process_account(&mut self, index: usize) -> Result<Stats, StepError> {
        let outcome = self.refresh_account(index).await;
        let now = Local::now();
        let Some(account) = self.registry.get_mut(index) else {
            return outcome;
        };

        match &outcome {
            Ok(stats) => {
                account.record_success(*stats, now);
                let name = account.username.clone().unwrap_or_default();
                info!(
                    account = index,
                    username = %name,
                    points_today = stats.points_today,
                    total_points = stats.total_points,
                    "Account refreshed"
                );
                self.activity.push(
                    ActivityLevel::Success,
                    Some(index),
                    format!(
                        "{name}: ping ok | today {:.2} | total {:.2}",
                        stats.points_today, stats.total_points
                    ),
                );
            }
            Err(e) => {
                account.record_failure(now);
                warn!(
                    account = index,
                    step = %e.step,
                    kind = ?e.source.kind(),
                    error = %e.source,
                    "Account refresh failed"
                );
                let level = if e.source.is_recoverable() {
                    ActivityLevel::Warning
                } else {
                    ActivityLevel::Error
                };
                self.activity.push(level, Some(index), e.to_string());
            }
        }
        outcome
    }

    /// One pass over every account, pausing after each. Returns `false` if
    /// cancelled before the pass completed.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> bool {
        self.cycle += 1;
        info!(
            cycle = self.cycle,
            accounts = self.registry.len(),
            "Starting refresh cycle"
        );

        if self.registry.is_empty() {
            warn!(cycle = self.cycle, "No accounts to refresh");
        }

        for index in 0..self.registry.len() {
            if cancel.is_cancelled() {
                return false;
            }
            self.phase = Phase::Refreshing { account: index };
            self.publish();

            // Outcome is already recorded; one account's failure never
            // stops the others.
            let _ = self.process_account(index).await;
            self.publish();

            if !pause(self.options.pacing.account_delay, cancel).await {
                return false;
            }
        }

        let connected = self
            .registry
            .iter()
            .filter(|a| a.status == AccountStatus::Connected)
            .count();
        let failed = self.registry.len() - connected;
        info!(cycle = self.cycle, connected, failed, "Refresh cycle complete");
        self.activity.push(
            ActivityLevel::Info,
            None,
            format!(
                "Cycle {} complete: {connected} connected, {failed} not connected",
                self.cycle
            ),
        );
        self.phase = Phase::Idle;
        self.publish();
        true
    }

    /// Run cycles until cancelled, pausing after each. Returns the final
    /// snapshot.
    pub async fn run(mut self, cancel: CancellationToken) -> Snapshot {
        loop {
            if !self.run_cycle(&cancel).await {
                break;
            }

            let delay = self.options.pacing.cycle_delay;
            let next_cycle_at =
                Local::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
            self.phase = Phase::Sleeping { next_cycle_at };
            self.publish();

            if !pause(delay, &cancel).await {
                break;
            }
        }

        info!(cycles = self.cycle, "Refresh runner stopped");
        self.phase = Phase::Stopped;
        self.publish();
        self.snapshot()
    }
}
