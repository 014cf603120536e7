use std::path::PathBuf;

use clap::Parser;
use console::Term;
use miette::IntoDiagnostic;
use tokio_util::sync::CancellationToken;

use rewards_monitor::config::AppConfig;
use rewards_monitor::core::client::RewardsClient;
use rewards_monitor::core::input;
use rewards_monitor::core::logging;
use rewards_monitor::core::proxy::Proxy;
use rewards_monitor::core::registry::AccountRegistry;
use rewards_monitor::core::runner::{Pacing, RefreshRunner, RunnerOptions, Snapshot};
use rewards_monitor::tui::{prompt, render_dashboard, RenderOptions};

/// Poll a rewards service for every token and show a live status table.
#[derive(Debug, Parser)]
#[command(name = "rewards-monitor", version, about)]
struct Cli {
    /// Config file (default: ~/.config/rewards-monitor/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Token file, one bearer token per line
    #[arg(long)]
    tokens: Option<PathBuf>,

    /// Proxy file, one scheme://[user:password@]host:port per line
    #[arg(long)]
    proxies: Option<PathBuf>,

    /// Use proxies without asking
    #[arg(long, conflicts_with = "no_proxies")]
    use_proxies: bool,

    /// Run every account direct without asking
    #[arg(long)]
    no_proxies: bool,

    /// Run a single cycle, print the table and exit
    #[arg(long)]
    once: bool,

    /// Seconds to wait after each account
    #[arg(long)]
    account_delay: Option<u64>,

    /// Seconds to wait after each cycle
    #[arg(long)]
    cycle_delay: Option<u64>,
}

impl Cli {
    /// CLI flags override the config file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.tokens {
            config.input.tokens_file = path.clone();
        }
        if let Some(path) = &self.proxies {
            config.input.proxies_file = path.clone();
        }
        if let Some(secs) = self.account_delay {
            config.schedule.account_delay_secs = secs;
        }
        if let Some(secs) = self.cycle_delay {
            config.schedule.cycle_delay_secs = secs;
        }
    }
}

/// Decide on proxy usage (flags first, then prompts) and load the list.
fn select_proxies(cli: &Cli, config: &AppConfig, term: &Term) -> miette::Result<Vec<Proxy>> {
    let use_proxies = if cli.use_proxies {
        true
    } else if cli.no_proxies {
        false
    } else {
        prompt::ask_use_proxies(term).into_diagnostic()?
            && prompt::acknowledge_proxy_risk(term).into_diagnostic()?
    };

    if !use_proxies {
        tracing::info!("Proxy usage declined, all accounts run direct");
        return Ok(Vec::new());
    }

    let proxies = input::load_proxies(&config.input.proxies_file)?;
    if proxies.is_empty() {
        logging::print_warning(&format!(
            "No proxies loaded from {}, all accounts will run direct",
            config.input.proxies_file.display()
        ));
    } else {
        logging::print_info(&format!("Loaded {} proxies", proxies.len()));
    }
    Ok(proxies)
}

fn draw(term: &Term, snapshot: &Snapshot, opts: &RenderOptions) -> miette::Result<()> {
    let frame = render_dashboard(snapshot, opts);
    term.clear_screen().into_diagnostic()?;
    term.write_str(&frame).into_diagnostic()?;
    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let _log_guard = if cli.once {
        logging::init(AppConfig::log_dir())
    } else {
        logging::init_dashboard(AppConfig::log_dir())
    };
    tracing::info!("Rewards Monitor v{} starting", rewards_monitor::VERSION);

    let mut config = AppConfig::load(cli.config.as_deref());
    cli.apply(&mut config);
    if config.api.uses_placeholder_base_url() {
        logging::print_warning(&format!(
            "api.base_url is the placeholder {}; set it in the config file",
            config.api.base_url
        ));
    }

    let tokens = input::load_tokens(&config.input.tokens_file)?;
    logging::print_success(&format!("Loaded {} tokens", tokens.len()));

    let term = Term::stdout();
    let proxies = select_proxies(&cli, &config, &term)?;

    let registry = AccountRegistry::from_tokens(tokens, &proxies);
    let api = RewardsClient::new(&config.api)?;
    let options = RunnerOptions {
        pacing: Pacing::from(&config.schedule),
        log_capacity: config.display.log_lines,
        token_prefix_len: config.display.token_prefix_len,
    };
    let mut runner = RefreshRunner::new(api, registry, options);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        }
    });

    let render_opts = RenderOptions {
        colorize: logging::should_colorize(),
        ..RenderOptions::default()
    };

    if cli.once {
        runner.run_cycle(&cancel).await;
        println!("{}", render_dashboard(&runner.snapshot(), &render_opts));
        return Ok(());
    }

    let mut snapshots = runner.subscribe();
    let handle = tokio::spawn(runner.run(cancel.clone()));

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        draw(&term, &snapshot, &render_opts)?;
        if snapshots.changed().await.is_err() {
            break;
        }
    }

    let last = match handle.await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            logging::print_error(&format!("Refresh task aborted: {e}"));
            return Err(e).into_diagnostic();
        }
    };
    draw(&term, &last, &render_opts)?;
    logging::print_info("Stopped.");
    Ok(())
}
