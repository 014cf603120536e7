//! Dashboard rendering.
//!
//! [`render_dashboard`] is a pure function of a [`Snapshot`]: it returns the
//! full screen as a string and never touches the terminal.

use chrono::{DateTime, Local};
use console::{measure_text_width, pad_str, style, truncate_str, Alignment, Color};

use crate::core::activity::{ActivityEntry, ActivityLevel};
use crate::core::logging::ColorPalette;
use crate::core::registry::{AccountStatus, AccountView};
use crate::core::runner::{Phase, Snapshot};

const TITLE: &str = "Rewards Monitor";
const DIRECT: &str = "Direct";
const EMPTY: &str = "-";
const MAX_CELL_WIDTH: usize = 30;
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub colorize: bool,
    pub palette: ColorPalette,
}

impl RenderOptions {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn colored() -> Self {
        Self {
            colorize: true,
            ..Self::default()
        }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        style(text).fg(color).force_styling(self.colorize).to_string()
    }

    fn bold(&self, text: &str) -> String {
        style(text).bold().force_styling(self.colorize).to_string()
    }

    fn status_color(&self, status: AccountStatus) -> Color {
        match status {
            AccountStatus::Initializing => self.palette.warning,
            AccountStatus::Connected => self.palette.success,
            AccountStatus::Error => self.palette.error,
        }
    }

    fn level_color(&self, level: ActivityLevel) -> Color {
        match level {
            ActivityLevel::Info => self.palette.info,
            ActivityLevel::Success => self.palette.success,
            ActivityLevel::Warning => self.palette.warning,
            ActivityLevel::Error => self.palette.error,
        }
    }
}

fn format_time(at: Option<DateTime<Local>>) -> String {
    at.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| EMPTY.to_string())
}

struct Column {
    title: &'static str,
    align: Alignment,
}

const COLUMNS: [Column; 9] = [
    Column { title: "#", align: Alignment::Right },
    Column { title: "Token", align: Alignment::Left },
    Column { title: "Username", align: Alignment::Left },
    Column { title: "Email", align: Alignment::Left },
    Column { title: "Proxy", align: Alignment::Left },
    Column { title: "Status", align: Alignment::Left },
    Column { title: "Today", align: Alignment::Right },
    Column { title: "Total", align: Alignment::Right },
    Column { title: "Updated", align: Alignment::Left },
];

fn row_cells(account: &AccountView) -> [String; 9] {
    [
        (account.index + 1).to_string(),
        account.masked_token.clone(),
        account.username.clone().unwrap_or_else(|| EMPTY.to_string()),
        account.email.clone().unwrap_or_else(|| EMPTY.to_string()),
        account.proxy.clone().unwrap_or_else(|| DIRECT.to_string()),
        account.status.label().to_string(),
        format!("{:.2}", account.points_today),
        format!("{:.2}", account.total_points),
        format_time(account.last_update),
    ]
}

/// Pad `cell` to `width`, cutting it with a `~` only when it is wider.
fn fit_cell(cell: &str, width: usize, align: Alignment) -> String {
    if measure_text_width(cell) > width {
        let cut = truncate_str(cell, width, "~");
        pad_str(&cut, width, align, None).into_owned()
    } else {
        pad_str(cell, width, align, None).into_owned()
    }
}

fn render_table(accounts: &[AccountView], opts: &RenderOptions, out: &mut String) {
    let rows: Vec<[String; 9]> = accounts.iter().map(row_cells).collect();

    let widths: Vec<usize> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| {
            rows.iter()
                .map(|r| measure_text_width(&r[i]))
                .chain(std::iter::once(col.title.len()))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect();

    let header: Vec<String> = COLUMNS
        .iter()
        .zip(&widths)
        .map(|(col, &w)| pad_str(col.title, w, col.align, None).into_owned())
        .collect();
    out.push_str(&opts.bold(&header.join("  ")));
    out.push('\n');

    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&opts.paint(&"-".repeat(rule_width), opts.palette.muted));
    out.push('\n');

    for (account, cells) in accounts.iter().zip(&rows) {
        let line: Vec<String> = cells
            .iter()
            .zip(COLUMNS.iter().zip(&widths))
            .enumerate()
            .map(|(i, (cell, (col, &w)))| {
                let padded = fit_cell(cell, w, col.align);
                match i {
                    5 => opts.paint(&padded, opts.status_color(account.status)),
                    4 if account.proxy.is_none() => opts.paint(&padded, opts.palette.muted),
                    _ => padded,
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
}

fn render_activity(entries: &[ActivityEntry], opts: &RenderOptions, out: &mut String) {
    out.push_str(&opts.bold("Activity"));
    out.push('\n');
    if entries.is_empty() {
        out.push_str(&opts.paint("  waiting for first results...", opts.palette.muted));
        out.push('\n');
        return;
    }
    for entry in entries {
        let who = entry
            .account
            .map(|i| format!("#{}", i + 1))
            .unwrap_or_else(|| "--".to_string());
        let line = format!(
            "[{}] {:>3} {}",
            entry.at.format(TIME_FORMAT),
            who,
            entry.message
        );
        out.push_str(&opts.paint(&line, opts.level_color(entry.level)));
        out.push('\n');
    }
}

/// Render the full dashboard for one snapshot.
pub fn render_dashboard(snapshot: &Snapshot, opts: &RenderOptions) -> String {
    let mut out = String::new();

    let connected = snapshot.count(AccountStatus::Connected);
    let errored = snapshot.count(AccountStatus::Error);
    let pending = snapshot.count(AccountStatus::Initializing);
    out.push_str(&format!(
        "{} | cycle {} | {} | {} | {}\n\n",
        opts.paint(&opts.bold(TITLE), opts.palette.primary),
        snapshot.cycle,
        opts.paint(&format!("{connected} connected"), opts.palette.success),
        opts.paint(&format!("{errored} error"), opts.palette.error),
        opts.paint(&format!("{pending} initializing"), opts.palette.warning),
    ));

    render_table(&snapshot.accounts, opts, &mut out);

    let today: f64 = snapshot.accounts.iter().map(|a| a.points_today).sum();
    let total: f64 = snapshot.accounts.iter().map(|a| a.total_points).sum();
    out.push_str(&format!(
        "\nTotals: today {today:.2} | balance {total:.2} | accounts {}\n",
        snapshot.accounts.len()
    ));

    let status_line = match snapshot.phase {
        Phase::Idle => "Idle".to_string(),
        Phase::Refreshing { account } => format!("Refreshing account #{}", account + 1),
        Phase::Sleeping { next_cycle_at } => {
            format!("Next refresh at {}", next_cycle_at.format(TIME_FORMAT))
        }
        Phase::Stopped => "Stopped".to_string(),
    };
    out.push_str(&opts.paint(&status_line, opts.palette.muted));
    out.push_str("\n\n");

    render_activity(&snapshot.activity, opts, &mut out);
    out
}
