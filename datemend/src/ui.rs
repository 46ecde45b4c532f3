//! Interactive prompts, menus, and report rendering.
//!
//! Everything here talks to a human on a terminal. Nothing in this module
//! touches the database; callers hand in data and get decisions back.

use std::io::{self, Write};
use std::time::Duration;

use colored::Colorize;
use datemend_core::models::{ColumnRecord, ColumnStatus, Inventory};
use datemend_core::remediation::BatchOutcome;
use indicatif::{ProgressBar, ProgressStyle};

use crate::workflow::Action;

/// Maximum column width before truncation in report tables
const MAX_COLUMN_WIDTH: usize = 32;

/// Reads one trimmed line from stdin, `None` on EOF.
fn read_line() -> Option<String> {
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) => None,
        Ok(_) => Some(input.trim().to_string()),
        Err(_) => None,
    }
}

/// Prints a prompt and reads the reply from the same line.
fn prompt(question: &str) -> Option<String> {
    print!("{} ", question);
    let _ = io::stdout().flush();
    read_line()
}

/// Asks a yes/no question that defaults to no. EOF counts as no.
pub fn confirm(question: &str) -> bool {
    match prompt(&format!("{} [y/N]:", question)) {
        Some(answer) => {
            let answer = answer.to_lowercase();
            answer == "y" || answer == "yes"
        }
        None => false,
    }
}

/// Operator decision at the gate in front of a mutation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Preview,
    Cancel,
}

/// Shows the proceed / preview / cancel gate. EOF and Enter both cancel,
/// so nothing runs without a deliberate keystroke.
pub fn gate() -> Gate {
    loop {
        let Some(answer) = prompt("Proceed, preview affected rows, or cancel? [p/v/C]:") else {
            return Gate::Cancel;
        };
        match answer.to_lowercase().as_str() {
            "p" | "proceed" => return Gate::Proceed,
            "v" | "preview" => return Gate::Preview,
            "" | "c" | "cancel" => return Gate::Cancel,
            other => println!("Unrecognized choice '{other}'"),
        }
    }
}

/// Numbered multi-select with every entry selected by default.
///
/// Enter keeps everything, `none` clears the selection, and a
/// comma-separated list like `1,3` picks exactly those entries.
/// Invalid input re-prompts. Returns zero-based indices.
pub fn multi_select(title: &str, items: &[String]) -> Vec<usize> {
    println!("\n{}", title.bold());
    for (i, item) in items.iter().enumerate() {
        println!("  [{}] {}", i + 1, item);
    }

    loop {
        let Some(answer) = prompt("Selection (Enter = all, `none` = none, e.g. 1,3):") else {
            return (0..items.len()).collect();
        };
        if answer.is_empty() {
            return (0..items.len()).collect();
        }
        if answer.eq_ignore_ascii_case("none") {
            return Vec::new();
        }
        match parse_index_list(&answer, items.len()) {
            Ok(indices) => return indices,
            Err(message) => println!("{}", message.yellow()),
        }
    }
}

/// Parses a 1-based comma-separated index list into zero-based indices,
/// preserving order and dropping duplicates.
fn parse_index_list(input: &str, len: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let number: usize = part
            .parse()
            .map_err(|_| format!("'{part}' is not a number"))?;
        if number == 0 || number > len {
            return Err(format!("{number} is out of range (1-{len})"));
        }
        let index = number - 1;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    if indices.is_empty() {
        return Err("Empty selection; type `none` to select nothing".to_string());
    }
    Ok(indices)
}

/// Menu availability derived from the current inventory.
pub struct MenuState {
    pub has_inventory: bool,
    pub fixable: usize,
    pub not_null_bad: usize,
    pub convertible: usize,
}

impl MenuState {
    pub fn from_inventory(inventory: Option<&Inventory>) -> Self {
        match inventory {
            Some(inv) => Self {
                has_inventory: true,
                fixable: inv.fixable_columns().len(),
                not_null_bad: inv.not_null_bad_columns().len(),
                convertible: inv.convertible_columns().len(),
            },
            None => Self {
                has_inventory: false,
                fixable: 0,
                not_null_bad: 0,
                convertible: 0,
            },
        }
    }
}

/// Shows the top-level menu and returns the chosen action.
///
/// Entries that cannot run yet are dimmed with the reason, and selecting
/// one repeats the reason rather than doing nothing. EOF exits.
pub fn main_menu(state: &MenuState) -> Action {
    let scan_first = "run a scan first".to_string();
    let entries: Vec<(Action, String, Option<String>)> = vec![
        (Action::Scan, "Scan MySQL schemas for zero dates".to_string(), None),
        (Action::Report, "Show the inventory report".to_string(), None),
        (
            Action::FixNulls,
            format!("Set zero-date rows to NULL ({} columns)", state.fixable),
            if !state.has_inventory {
                Some(scan_first.clone())
            } else if state.fixable == 0 {
                Some("no nullable columns hold zero dates".to_string())
            } else {
                None
            },
        ),
        (
            Action::AllowNulls,
            format!("Make NOT NULL date columns nullable ({} columns)", state.not_null_bad),
            if !state.has_inventory {
                Some(scan_first.clone())
            } else if state.not_null_bad == 0 {
                Some("no NOT NULL columns hold zero dates".to_string())
            } else {
                None
            },
        ),
        (
            Action::ConvertTimestamps,
            format!("Convert TIMESTAMP columns to DATETIME ({} columns)", state.convertible),
            if !state.has_inventory {
                Some(scan_first)
            } else if state.convertible == 0 {
                Some("no TIMESTAMP columns in the inventory".to_string())
            } else {
                None
            },
        ),
        (Action::Exit, "Exit".to_string(), None),
    ];

    println!("\n{}", "What next?".bold());
    for (i, (_, label, disabled)) in entries.iter().enumerate() {
        match disabled {
            Some(reason) => println!(
                "  {}. {} {}",
                i + 1,
                label.dimmed(),
                format!("({reason})").dimmed()
            ),
            None => println!("  {}. {}", i + 1, label),
        }
    }

    loop {
        let Some(answer) = prompt("Choice:") else {
            return Action::Exit;
        };
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= entries.len() => {
                let (action, _, disabled) = &entries[n - 1];
                if let Some(reason) = disabled {
                    println!("{}", format!("Not available yet: {reason}").yellow());
                    continue;
                }
                return *action;
            }
            _ => println!("Enter a number between 1 and {}", entries.len()),
        }
    }
}

/// Truncates a cell to the column width, with ellipsis when it fits.
fn truncate_value(value: &str, max_width: usize) -> String {
    if value.len() <= max_width {
        value.to_string()
    } else if max_width <= 3 {
        value.chars().take(max_width).collect()
    } else {
        let take = max_width - 3;
        format!("{}...", value.chars().take(take).collect::<String>())
    }
}

/// Builds one horizontal border line for the report table.
fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut line = String::new();
    line.push(left);
    for (idx, width) in widths.iter().enumerate() {
        line.push_str(&"─".repeat(width + 2));
        line.push(if idx == widths.len() - 1 { right } else { mid });
    }
    line
}

fn status_cell(status: ColumnStatus, padded: String) -> String {
    match status {
        ColumnStatus::Clean => padded.green().to_string(),
        ColumnStatus::BadFixable | ColumnStatus::BadNotNull => padded.yellow().to_string(),
        ColumnStatus::CountFailed => padded.red().to_string(),
    }
}

/// Renders the inventory as a bordered table with a summary footer.
pub fn print_report(inventory: &Inventory) {
    if inventory.is_empty() {
        println!(
            "{}",
            "No date-bearing columns in the inventory. Run a scan first.".yellow()
        );
        return;
    }

    let headers = ["SCHEMA", "TABLE", "COLUMN", "TYPE", "NULL", "BAD ROWS", "STATUS"];
    let mut rows: Vec<([String; 7], ColumnStatus)> = Vec::with_capacity(inventory.columns.len());
    for record in &inventory.columns {
        let bad_rows = if record.count_failed() {
            "?".to_string()
        } else {
            record.bad_rows.to_string()
        };
        rows.push((
            [
                record.schema.clone(),
                record.table.clone(),
                record.column.clone(),
                record.column_type.to_string(),
                record.nullable.to_string(),
                bad_rows,
                record.status().label().to_string(),
            ],
            record.status(),
        ));
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for (cells, _) in &rows {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(cell.len().min(MAX_COLUMN_WIDTH));
        }
    }

    println!("{}", border(&widths, '┌', '┬', '┐'));
    let mut header_line = String::from("│");
    for (i, header) in headers.iter().enumerate() {
        header_line.push(' ');
        header_line.push_str(&format!("{:width$}", header, width = widths[i]));
        header_line.push_str(" │");
    }
    println!("{header_line}");
    println!("{}", border(&widths, '├', '┼', '┤'));

    for (cells, status) in &rows {
        let mut line = String::from("│");
        for (i, cell) in cells.iter().enumerate() {
            line.push(' ');
            let padded = format!(
                "{:width$}",
                truncate_value(cell, widths[i]),
                width = widths[i]
            );
            // Pad before coloring so the escape codes do not skew alignment.
            if i == 6 {
                line.push_str(&status_cell(*status, padded));
            } else {
                line.push_str(&padded);
            }
            line.push_str(" │");
        }
        println!("{line}");
    }

    println!("{}", border(&widths, '└', '┴', '┘'));
    let row_label = if rows.len() == 1 { "row" } else { "rows" };
    println!("({} {})", rows.len(), row_label);

    println!(
        "\n{} schemas, {} columns with zero dates, {} bad rows total",
        inventory.schemas.len(),
        inventory.bad_column_count(),
        inventory.bad_row_total()
    );
    let failed = inventory.failed_columns().len();
    if failed > 0 {
        println!(
            "{}",
            format!("{failed} columns could not be counted (shown as ?)").red()
        );
    }
    let zero_defaults = inventory.zero_default_columns().len();
    if zero_defaults > 0 {
        println!(
            "{}",
            format!(
                "{zero_defaults} columns declare a zero-date DEFAULT; \
                 new rows will keep arriving broken until those defaults change"
            )
            .yellow()
        );
    }
    println!(
        "Scanned at {}",
        inventory.scanned_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

/// Prints up to a handful of sampled zero-date rows for one column.
pub fn print_sample_rows(column: &ColumnRecord, rows: &[serde_json::Value]) {
    println!(
        "\n{}",
        format!(
            "{} ({} zero-date rows)",
            column.qualified_name(),
            column.bad_rows
        )
        .bold()
    );
    if rows.is_empty() {
        println!("  (no rows could be fetched)");
        return;
    }
    for row in rows {
        println!("  {row}");
    }
}

/// Prints the result of a remediation batch, column by column.
pub fn print_outcome(outcome: &BatchOutcome, submitted: usize) {
    for done in &outcome.succeeded {
        println!(
            "  {} {} ({} rows)",
            "✓".green(),
            done.record.qualified_name(),
            done.rows_affected
        );
    }
    match &outcome.failure {
        None => println!(
            "{}",
            format!(
                "All {} columns done, {} rows touched.",
                submitted,
                outcome.rows_touched()
            )
            .green()
        ),
        Some((index, error)) => {
            println!(
                "{}",
                format!("Failed on column {} of {}: {}", index + 1, submitted, error).red()
            );
            let remaining = submitted.saturating_sub(index + 1);
            if remaining > 0 {
                println!(
                    "{}",
                    format!("{remaining} columns were not attempted.").yellow()
                );
            }
        }
    }
}

/// Spinner for phases without a known length.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Progress bar for the per-column counting pass.
pub fn count_progress(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:30.cyan} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}
