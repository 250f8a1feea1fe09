//! Terminal output formatting.

use boardsync_client::BoardStore;
use boardsync_core::task::columns;
use boardsync_core::{AgentSuggestion, BoardSyncTask, ConnectionState, SyncConfig, TaskStatus};
use colored::{ColoredString, Colorize};
use unicode_width::UnicodeWidthStr;

/// Colored label for a connection state.
pub fn state_label(state: ConnectionState) -> ColoredString {
    match state {
        ConnectionState::Connected => "connected".green().bold(),
        ConnectionState::Connecting => "connecting".yellow(),
        ConnectionState::Reconnecting => "reconnecting".yellow().bold(),
        ConnectionState::Disconnected => "disconnected".red(),
    }
}

pub fn print_state(board_id: &str, state: ConnectionState) {
    println!("{} {} {}", "●".dimmed(), board_id.cyan(), state_label(state));
}

fn status_label(status: TaskStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        TaskStatus::Inbox => label.blue(),
        TaskStatus::InProgress => label.yellow(),
        TaskStatus::Review => label.magenta(),
        TaskStatus::Done => label.green(),
    }
}

/// Get priority indicator.
fn priority_indicator(priority: &str) -> ColoredString {
    match priority {
        "urgent" | "critical" => "!!".red().bold(),
        "high" => "! ".yellow(),
        "medium" => "· ".dimmed(),
        _ => "  ".normal(),
    }
}

/// Print tasks as a table.
pub fn print_tasks_table(tasks: &[BoardSyncTask]) {
    if tasks.is_empty() {
        println!("{}", "No tasks found.".dimmed());
        return;
    }

    // Full ids: `task move` takes them as printed.
    let id_width = id_column_width(tasks);
    let title_width = term_width()
        .saturating_sub(id_width + 30)
        .clamp(16, 60);
    println!(
        "{} {} {:<12} {:<8}",
        pad_right("ID", id_width),
        pad_right("Title", title_width),
        "Status",
        "Priority"
    );
    println!("{}", "─".repeat(id_width + title_width + 24));

    for task in tasks {
        let title = truncate_visual(&task.title, title_width);
        println!(
            "{} {} {:<12} {:<8}",
            pad_right(&task.id, id_width),
            pad_right(&title, title_width),
            status_label(task.status),
            task.priority
        );
    }

    println!();
    println!("{} task(s) total", tasks.len());
}

/// Print the board grouped by column, followed by the suggestion buffer.
pub fn print_board(store: &BoardStore) {
    let tasks = store.tasks();
    if tasks.is_empty() {
        println!("{}", "No tasks on this board.".dimmed());
    }

    let title_width = term_width().saturating_sub(16).clamp(16, 72);
    for (status, column) in columns(tasks) {
        if column.is_empty() {
            continue;
        }
        println!(
            " {} {} {}",
            "▸".dimmed(),
            status_label(status).bold(),
            column.len().to_string().dimmed()
        );
        for task in column {
            let title = truncate_visual(&task.title, title_width);
            let title = match status {
                TaskStatus::Done => title.as_str().green().dimmed(),
                TaskStatus::InProgress => title.as_str().yellow(),
                TaskStatus::Review => title.as_str().magenta(),
                TaskStatus::Inbox => title.as_str().normal(),
            };
            println!(
                "   {} {} {}",
                priority_indicator(&task.priority),
                title,
                short_id(&task.id).dimmed()
            );
        }
    }

    let total = tasks.len();
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    if total > 0 {
        println!(
            " {} {} tasks {} {} done ({}%)",
            "■".cyan(),
            total.to_string().bold(),
            "·".dimmed(),
            done.to_string().green(),
            (done * 100) / total
        );
    }

    let suggestions: Vec<&AgentSuggestion> = store.suggestions().iter().collect();
    if !suggestions.is_empty() {
        println!();
        print_suggestions(&suggestions);
    }
}

pub fn print_suggestions(suggestions: &[&AgentSuggestion]) {
    println!("{}", "Suggestions".bold());
    let title_width = term_width().saturating_sub(20).clamp(16, 72);
    for suggestion in suggestions {
        println!(
            "  {} {} {}",
            "✦".cyan(),
            truncate_visual(&suggestion.title, title_width),
            format!("{:.0}%", suggestion.confidence * 100.0).dimmed()
        );
    }
}

/// Print the effective configuration, with the token masked.
pub fn print_config(config: &SyncConfig, source: Option<&std::path::Path>) {
    let token = match config.bearer_token() {
        Some(token) if token.chars().count() > 4 => {
            format!("{}…", token.chars().take(4).collect::<String>())
        }
        Some(_) => "****".to_string(),
        None => "(none)".to_string(),
    };
    let source = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    println!("{}: {}", "Source".bold(), source.dimmed());
    println!("{}: {}", "API URL".bold(), config.api_url);
    println!("{}: {}", "Board".bold(), config.board_id);
    println!("{}: {}", "Token".bold(), token);
    println!("{}: {}", "Enabled".bold(), config.enabled);
    println!("{}: {} ms", "Heartbeat".bold(), config.heartbeat_interval_ms);
    println!(
        "{}: {} ms × {} (max {} ms)",
        "Backoff".bold(),
        config.backoff.base_ms,
        config.backoff.multiplier,
        config.backoff.max_ms
    );
}

fn id_column_width(tasks: &[BoardSyncTask]) -> usize {
    tasks
        .iter()
        .map(|t| UnicodeWidthStr::width(t.id.as_str()))
        .max()
        .unwrap_or(0)
        .max(2)
}

/// First eight characters, for the board view. `task move` accepts any
/// unique prefix.
fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Get terminal width, defaulting to 80.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}
