//! Colored CLI display utilities.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::monitor::{MonitorEvent, MonitorSummary, WatchSet};
use crate::settings::MonitorSettings;
use crate::storage::ExecutableDetails;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Width of the executable name column.
const NAME_WIDTH: usize = 32;

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Format minutes as `Xh YYm`.
#[must_use]
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours == 0 {
        format!("{rest}m")
    } else {
        format!("{hours}h {rest:02}m")
    }
}

/// Print a monitor event as a single line.
pub fn print_event(event: &MonitorEvent) {
    let ts = timestamp();
    match event {
        MonitorEvent::Started { executable, .. } => {
            println!("{} {} {}", ts.dimmed(), "[START]".green().bold(), executable);
        }
        MonitorEvent::Stopped {
            executable,
            minutes,
            ..
        } => {
            println!(
                "{} {} {} ({})",
                ts.dimmed(),
                "[STOP]".yellow().bold(),
                executable,
                format_minutes(*minutes).dimmed()
            );
        }
        MonitorEvent::Flushed {
            executable,
            delta_minutes,
            total_minutes,
        } => {
            println!(
                "{} {} {} +{} (total {})",
                ts.dimmed(),
                "[SAVE]".blue().bold(),
                executable,
                delta_minutes,
                format_minutes(*total_minutes).cyan()
            );
        }
        MonitorEvent::FlushFailed { executable, error } => {
            println!(
                "{} {} {} - {}",
                ts.dimmed(),
                "[RETRY]".red().bold(),
                executable,
                error.dimmed()
            );
        }
        MonitorEvent::Lifecycle { state } => {
            println!(
                "{} {} {}",
                ts.dimmed(),
                "[MONITOR]".magenta().bold(),
                state
            );
        }
    }
    let _ = io::stdout().flush();
}

/// Print any serializable value as one line of JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => print_error(&format!("failed to encode output: {e}")),
    }
    let _ = io::stdout().flush();
}

/// Print persisted totals as a table.
pub fn print_totals(details: &[ExecutableDetails], total_minutes: u64) {
    if details.is_empty() {
        println!("{}", "No playtime recorded yet.".dimmed());
        return;
    }
    println!(
        "{:<width$} {:>8} {:>10}",
        "EXECUTABLE".bold(),
        "GAME".bold(),
        "PLAYED".bold(),
        width = NAME_WIDTH
    );
    for d in details {
        let game = d
            .game_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:<width$} {:>8} {:>10}",
            truncate(&d.executable_name, NAME_WIDTH),
            game,
            format_minutes(d.minutes_played),
            width = NAME_WIDTH
        );
    }
    println!(
        "{:<width$} {:>8} {:>10}",
        "TOTAL".bold(),
        "",
        format_minutes(total_minutes).cyan(),
        width = NAME_WIDTH
    );
    let _ = io::stdout().flush();
}

/// Print the stored monitor settings.
pub fn print_settings(settings: &MonitorSettings) {
    let status = if settings.enabled {
        "enabled".green().to_string()
    } else {
        "disabled".red().to_string()
    };
    println!("{} {}", "monitoring:".bold(), status);
    println!("{}", "paths:".bold());
    for entry in settings.path_entries() {
        println!("  {entry}");
    }
    let _ = io::stdout().flush();
}

/// Print a resolved watch set grouped by executable name.
pub fn print_watch_set(set: &WatchSet) {
    if set.is_empty() {
        println!("{}", "Nothing to watch.".dimmed());
        return;
    }
    for (name, paths) in set.by_name() {
        println!("{}", name.bold());
        for path in paths {
            println!("  {}", path.display().dimmed());
        }
    }
    let _ = io::stdout().flush();
}

/// Print the summary returned when the monitor exits.
pub fn print_summary(summary: &MonitorSummary) {
    println!(
        "{} polls={} flushes={} saved={} failures={}",
        "[SUMMARY]".blue().bold(),
        summary.polls,
        summary.flushes,
        format_minutes(summary.minutes_flushed),
        summary.flush_failures + summary.enumeration_failures
    );
    for (executable, minutes) in &summary.unflushed {
        println!(
            "{} {} {} not saved",
            "[LOST]".red().bold(),
            executable,
            format_minutes(*minutes)
        );
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
