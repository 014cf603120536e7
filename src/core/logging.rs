//! Logging and console output.
//!
//! - Structured logs via `tracing`, written as daily-rolling JSON files
//! - Optional pretty stdout layer for non-dashboard runs
//! - Styled one-line console messages for startup (console)
//! - miette hook for fatal error reports

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use console::{style, Color, Term};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "rewards-monitor.log";

// ============================================================================
// Logging Initialization
// ============================================================================

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(log_dir: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    if !log_dir.exists() {
        if let Err(e) = fs::create_dir_all(log_dir) {
            eprintln!("Failed to create logs directory: {}", e);
        }
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    tracing_appender::non_blocking(file_appender)
}

/// Initialize logging with a JSON file layer and a pretty stdout layer.
///
/// Returns a `WorkerGuard` which must be kept alive for the duration of the
/// application so buffered logs are flushed on shutdown.
pub fn init(log_dir: PathBuf) -> WorkerGuard {
    let (non_blocking, guard) = file_writer(&log_dir);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_filter(env_filter());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .compact()
        .with_filter(env_filter());

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Logging already initialized");
    }

    init_miette();
    tracing::info!(
        "Logging initialized. Writing to: {:?} (daily rolling)",
        log_dir.join(LOG_FILE_NAME)
    );
    guard
}

/// Initialize logging for dashboard mode.
///
/// Identical to [`init()`] but omits the stdout layer; the dashboard redraws
/// the whole screen and owns the terminal.
pub fn init_dashboard(log_dir: PathBuf) -> WorkerGuard {
    let (non_blocking, guard) = file_writer(&log_dir);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_filter(env_filter());

    if tracing_subscriber::registry()
        .with(file_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Logging already initialized");
    }

    init_miette();
    guard
}

fn init_miette() {
    let colorize = should_colorize();
    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .context_lines(2)
                .color(colorize)
                .build(),
        )
    }))
    .ok(); // Ignore if already set
}

/// Whether stdout is an interactive terminal that renders colors.
pub fn should_colorize() -> bool {
    let term = Term::stdout();
    term.is_term() && term.features().colors_supported()
}

// ============================================================================
// Color Palette
// ============================================================================

/// Colors shared by the console helpers and the dashboard.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    pub primary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Blue,
            muted: Color::Color256(243),
        }
    }
}

// ============================================================================
// Console Output Utilities
// ============================================================================

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", style("[v]").green(), style(message).green());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("[x]").red(), style(message).red().bold());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!(
        "{} {}",
        style("[!]").yellow(),
        style(message).yellow().bold()
    );
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", style("(i)").blue(), style(message).blue());
}
