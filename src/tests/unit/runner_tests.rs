//! Refresh Cycle Runner Tests
//!
//! Drives the runner against the scripted API to check:
//! - per-account step ordering (profile -> ping -> stats)
//! - profile caching across cycles
//! - failure isolation between accounts
//! - fixed pacing between accounts and cycles
//! - proxy routing and unsupported schemes
//! - cancellation and snapshot publication

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::activity::ActivityLevel;
use crate::core::client::{MockRewardsApi, Profile, Stats};
use crate::core::error::{ConfigError, ErrorKind, MonitorError, RequestError};
use crate::core::proxy::Proxy;
use crate::core::registry::{AccountRegistry, AccountStatus};
use crate::core::runner::{Pacing, Phase, RefreshRunner, RunnerOptions, Step};
use crate::tests::mocks::{ApiScript, Call};

// =============================================================================
// Helpers
// =============================================================================

fn tokens(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn options(pacing: Pacing) -> RunnerOptions {
    RunnerOptions {
        pacing,
        ..RunnerOptions::default()
    }
}

fn runner(
    names: &[&str],
    proxies: &[Proxy],
    pacing: Pacing,
) -> (RefreshRunner<MockRewardsApi>, ApiScript) {
    let script = ApiScript::new();
    let registry = AccountRegistry::from_tokens(tokens(names), proxies);
    (
        RefreshRunner::new(script.mock(), registry, options(pacing)),
        script,
    )
}

// =============================================================================
// Cycle Tests
// =============================================================================

#[tokio::test]
async fn test_cycle_connects_all_accounts() {
    let (mut runner, api) = runner(&["alpha", "beta"], &[], Pacing::immediate());
    api.set_stats("beta", 2.5, 250.0);

    assert!(runner.run_cycle(&CancellationToken::new()).await);

    let alpha = runner.registry().get(0).unwrap();
    assert_eq!(alpha.status, AccountStatus::Connected);
    assert_eq!(alpha.username.as_deref(), Some("user-alpha"));
    assert_eq!(alpha.email.as_deref(), Some("alpha@example.com"));
    assert!(alpha.last_update.is_some());

    let beta = runner.registry().get(1).unwrap();
    assert_eq!(beta.status, AccountStatus::Connected);
    assert_eq!(beta.points_today, 2.5);
    assert_eq!(beta.total_points, 250.0);
    assert_eq!(runner.cycle(), 1);
}

#[tokio::test]
async fn test_steps_run_in_order_and_accounts_sequentially() {
    let (mut runner, api) = runner(&["a", "b"], &[], Pacing::immediate());
    runner.run_cycle(&CancellationToken::new()).await;

    let order: Vec<(String, Call)> = api
        .calls()
        .into_iter()
        .map(|c| (c.token, c.call))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), Call::Profile),
            ("a".to_string(), Call::Ping),
            ("a".to_string(), Call::Stats),
            ("b".to_string(), Call::Profile),
            ("b".to_string(), Call::Ping),
            ("b".to_string(), Call::Stats),
        ]
    );
}

#[tokio::test]
async fn test_profile_fetched_once() {
    let (mut runner, api) = runner(&["a"], &[], Pacing::immediate());
    let cancel = CancellationToken::new();
    runner.run_cycle(&cancel).await;
    runner.run_cycle(&cancel).await;

    assert_eq!(
        api.calls_for("a"),
        vec![Call::Profile, Call::Ping, Call::Stats, Call::Ping, Call::Stats]
    );
}

#[tokio::test]
async fn test_profile_expectation_met_once_over_two_cycles() {
    let mut api = MockRewardsApi::new();
    api.expect_fetch_profile()
        .withf(|token, proxy| token.to_string() == "a" && proxy.is_none())
        .times(1)
        .returning(|_, _| {
            Ok(Profile {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            })
        });
    api.expect_ping().times(2).returning(|_, _| Ok(()));
    api.expect_fetch_stats().times(2).returning(|_, _| {
        Ok(Stats {
            points_today: 3.0,
            total_points: 9.0,
        })
    });

    let registry = AccountRegistry::from_tokens(tokens(&["a"]), &[]);
    let mut runner = RefreshRunner::new(api, registry, options(Pacing::immediate()));
    let cancel = CancellationToken::new();
    runner.run_cycle(&cancel).await;
    runner.run_cycle(&cancel).await;

    let account = runner.registry().get(0).unwrap();
    assert_eq!(account.username.as_deref(), Some("alice"));
    assert_eq!(account.total_points, 9.0);
}

#[tokio::test]
async fn test_stats_never_fetched_after_ping_failure() {
    let mut api = MockRewardsApi::new();
    api.expect_fetch_profile().returning(|token, _| {
        Ok(Profile {
            username: token.to_string(),
            email: format!("{token}@example.com"),
        })
    });
    api.expect_ping()
        .returning(|_, _| Err(RequestError::status(403, "challenge").into()));
    api.expect_fetch_stats().never();

    let registry = AccountRegistry::from_tokens(tokens(&["a"]), &[]);
    let mut runner = RefreshRunner::new(api, registry, options(Pacing::immediate()));
    let err = runner.process_account(0).await.unwrap_err();

    assert_eq!(err.step, Step::Ping);
    assert_eq!(
        runner.registry().get(0).unwrap().status,
        AccountStatus::Error
    );
}

#[tokio::test]
async fn test_unknown_account_index_is_an_error() {
    let (mut runner, api) = runner(&["a"], &[], Pacing::immediate());

    let err = runner.process_account(5).await.unwrap_err();
    assert!(matches!(
        err.source,
        MonitorError::Config(ConfigError::UnknownAccount { index: 5 })
    ));
    assert!(api.calls().is_empty());
    assert_eq!(
        runner.registry().get(0).unwrap().status,
        AccountStatus::Initializing
    );
}

#[tokio::test]
async fn test_empty_registry_cycle_completes() {
    let (mut runner, api) = runner(&[], &[], Pacing::immediate());

    assert!(runner.registry().is_empty());
    assert!(runner.run_cycle(&CancellationToken::new()).await);
    assert!(api.calls().is_empty());

    let summary = runner.activity().entries().last().unwrap();
    assert!(summary.message.contains("0 connected, 0 not connected"));
}

#[tokio::test]
async fn test_profile_retried_after_failure() {
    let (mut runner, api) = runner(&["a"], &[], Pacing::immediate());
    let cancel = CancellationToken::new();
    api.fail("a", Call::Profile, 503);

    runner.run_cycle(&cancel).await;
    let account = runner.registry().get(0).unwrap();
    assert_eq!(account.status, AccountStatus::Error);
    assert!(account.username.is_none());
    assert!(account.last_update.is_some());
    assert_eq!(api.calls_for("a"), vec![Call::Profile]);

    api.recover("a", Call::Profile);
    runner.run_cycle(&cancel).await;
    let account = runner.registry().get(0).unwrap();
    assert_eq!(account.status, AccountStatus::Connected);
    assert_eq!(account.username.as_deref(), Some("user-a"));
}

// =============================================================================
// Failure Isolation Tests
// =============================================================================

#[tokio::test]
async fn test_ping_failure_isolated_to_one_account() {
    let (mut runner, api) = runner(&["first", "second"], &[], Pacing::immediate());
    api.fail("first", Call::Ping, 403);

    runner.run_cycle(&CancellationToken::new()).await;

    let first = runner.registry().get(0).unwrap();
    assert_eq!(first.status, AccountStatus::Error);
    assert_eq!(first.points_today, 0.0);
    assert_eq!(first.total_points, 0.0);
    assert_eq!(api.calls_for("first"), vec![Call::Profile, Call::Ping]);

    let second = runner.registry().get(1).unwrap();
    assert_eq!(second.status, AccountStatus::Connected);
    assert_eq!(second.total_points, 10.0);
}

#[tokio::test]
async fn test_failure_keeps_cached_profile_and_points() {
    let (mut runner, api) = runner(&["a"], &[], Pacing::immediate());
    let cancel = CancellationToken::new();
    api.set_stats("a", 5.0, 50.0);
    runner.run_cycle(&cancel).await;

    api.fail("a", Call::Stats, 500);
    runner.run_cycle(&cancel).await;

    let account = runner.registry().get(0).unwrap();
    assert_eq!(account.status, AccountStatus::Error);
    assert_eq!(account.username.as_deref(), Some("user-a"));
    assert_eq!(account.email.as_deref(), Some("a@example.com"));
    assert_eq!(account.points_today, 5.0);
    assert_eq!(account.total_points, 50.0);
}

#[tokio::test]
async fn test_profile_failure_keeps_partial_cache() {
    let api = ApiScript::new();
    let mut registry = AccountRegistry::from_tokens(tokens(&["a"]), &[]);
    registry.get_mut(0).unwrap().username = Some("cached".to_string());
    let mut runner = RefreshRunner::new(api.mock(), registry, options(Pacing::immediate()));
    api.fail("a", Call::Profile, 500);

    let err = runner.process_account(0).await.unwrap_err();
    assert_eq!(err.step, Step::Profile);

    let account = runner.registry().get(0).unwrap();
    assert_eq!(account.username.as_deref(), Some("cached"));
    assert_eq!(account.status, AccountStatus::Error);
}

#[tokio::test]
async fn test_failure_is_logged_with_account_index() {
    let (mut runner, api) = runner(&["a", "b"], &[], Pacing::immediate());
    api.fail("b", Call::Stats, 429);
    runner.run_cycle(&CancellationToken::new()).await;

    let entry = runner
        .activity()
        .entries()
        .find(|e| e.account == Some(1))
        .expect("failure entry for account 1");
    assert_eq!(entry.level, ActivityLevel::Warning);
    assert!(entry.message.contains("stats fetch failed"));
    assert!(entry.message.contains("429"));

    let summary = runner.activity().entries().last().unwrap();
    assert!(summary.account.is_none());
    assert!(summary.message.contains("1 connected"));
}

// =============================================================================
// Proxy Tests
// =============================================================================

#[tokio::test]
async fn test_requests_routed_through_assigned_proxy() {
    let proxies = vec![
        Proxy::parse("http://p0:8080").unwrap(),
        Proxy::parse("socks5://u:pw@p1:1080").unwrap(),
    ];
    let (mut runner, api) = runner(&["a", "b", "c"], &proxies, Pacing::immediate());
    runner.run_cycle(&CancellationToken::new()).await;

    let route = |token: &str| {
        api.calls()
            .into_iter()
            .find(|c| c.token == token)
            .and_then(|c| c.proxy)
    };
    assert_eq!(route("a").as_deref(), Some("http://p0:8080"));
    assert_eq!(route("b").as_deref(), Some("socks5://p1:1080"));
    assert_eq!(route("c").as_deref(), Some("http://p0:8080"));
}

#[tokio::test]
async fn test_unsupported_scheme_skips_account_only() {
    let proxies = vec![
        Proxy::parse("ftp://bad:21").unwrap(),
        Proxy::parse("http://good:8080").unwrap(),
    ];
    let (mut runner, api) = runner(&["a", "b"], &proxies, Pacing::immediate());

    let err = runner.process_account(0).await.unwrap_err();
    assert_eq!(err.source.kind(), ErrorKind::Config);
    assert!(api.calls_for("a").is_empty());
    assert_eq!(
        runner.registry().get(0).unwrap().status,
        AccountStatus::Error
    );

    runner.process_account(1).await.unwrap();
    assert_eq!(
        runner.registry().get(1).unwrap().status,
        AccountStatus::Connected
    );

    let entry = runner.activity().entries().next().unwrap();
    assert_eq!(entry.level, ActivityLevel::Error);
}

// =============================================================================
// Pacing Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_next_account_waits_fixed_delay_after_failure() {
    let (mut runner, api) = runner(&["first", "second"], &[], Pacing::default());
    api.fail("first", Call::Ping, 403);

    runner.run_cycle(&CancellationToken::new()).await;

    let calls = api.calls();
    let first_last = calls.iter().filter(|c| c.token == "first").last().unwrap().at;
    let second_first = calls.iter().find(|c| c.token == "second").unwrap().at;
    assert!(second_first - first_last >= Duration::from_secs(1));
    assert_eq!(
        runner.registry().get(1).unwrap().status,
        AccountStatus::Connected
    );
}

#[tokio::test(start_paused = true)]
async fn test_cycle_delay_between_cycles() {
    let pacing = Pacing {
        account_delay: Duration::from_secs(1),
        cycle_delay: Duration::from_secs(30),
    };
    let (runner, api) = runner(&["a"], &[], pacing);
    let mut rx = runner.subscribe();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(runner.run(cancel.clone()));

    // Wait until the second cycle has started its stats call.
    loop {
        rx.changed().await.unwrap();
        if rx.borrow().cycle == 2 && api.calls_for("a").len() >= 4 {
            break;
        }
    }
    cancel.cancel();
    let final_snapshot = handle.await.unwrap();
    assert_eq!(final_snapshot.phase, Phase::Stopped);

    let calls = api.calls();
    let first_stats = calls[2].at;
    let second_ping = calls[3].at;
    assert!(second_ping - first_stats >= Duration::from_secs(31));
}

// =============================================================================
// Cancellation & Snapshot Tests
// =============================================================================

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let (mut runner, api) = runner(&["a"], &[], Pacing::immediate());
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(!runner.run_cycle(&cancel).await);
    assert!(api.calls().is_empty());
    assert_eq!(
        runner.registry().get(0).unwrap().status,
        AccountStatus::Initializing
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_during_cycle_delay() {
    let (runner, _api) = runner(&["a", "b"], &[], Pacing::default());
    let mut rx = runner.subscribe();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(runner.run(cancel.clone()));

    loop {
        rx.changed().await.unwrap();
        if matches!(rx.borrow().phase, Phase::Sleeping { .. }) {
            break;
        }
    }
    cancel.cancel();

    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.cycle, 1);
    assert_eq!(snapshot.phase, Phase::Stopped);
    assert_eq!(snapshot.count(AccountStatus::Connected), 2);
}

#[tokio::test]
async fn test_snapshots_published_per_account() {
    let (mut runner, _api) = runner(&["secret-token-value"], &[], Pacing::immediate());
    let rx = runner.subscribe();
    assert_eq!(rx.borrow().cycle, 0);

    runner.run_cycle(&CancellationToken::new()).await;

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.cycle, 1);
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.accounts[0].masked_token, "secret-t...");
    assert_eq!(snapshot.accounts[0].status, AccountStatus::Connected);
    assert!(!snapshot.activity.is_empty());
}
