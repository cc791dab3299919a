// Output formatting and display for CLI

use crate::ipc::protocol::{LifecycleEvent, LifecycleKind, ProcessInfo, ResponseData};
use crate::process::types::LifecycleState;
use chrono::Local;
use colored::*;
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Print a success response to stdout
pub fn print_success(data: &ResponseData) {
    match data {
        ResponseData::Accepted => {
            println!("{}", "✓ Launch request accepted".green().bold());
            println!("  Use {} to follow its progress", "appkeeper watch".cyan());
        }

        ResponseData::Alive => {
            println!("{}", "✓ Daemon is running".green().bold());
        }

        ResponseData::ProcessList(processes) => {
            if processes.is_empty() {
                println!("{}", "No processes are currently watched".yellow());
            } else {
                print_process_table(processes);
            }
        }

        ResponseData::Subscribed => {
            print_info("Subscribed to lifecycle signals");
        }
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print one lifecycle signal with a local timestamp
pub fn print_event(event: &LifecycleEvent) {
    println!(
        "{} {} {} {}",
        format!("[{}]", Local::now().format("%H:%M:%S")).dimmed(),
        format_kind_colored(event.kind),
        format!("#{}", event.id).bold(),
        truncate_path(&event.path, 60)
    );
}

/// Print a formatted table of processes
fn print_process_table(processes: &[ProcessInfo]) {
    #[derive(Tabled)]
    struct ProcessRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Path")]
        path: String,
        #[tabled(rename = "Mode")]
        mode: String,
        #[tabled(rename = "State")]
        state: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "Restarts")]
        restarts: String,
    }

    let rows: Vec<ProcessRow> = processes
        .iter()
        .map(|p| ProcessRow {
            id: p.id.to_string(),
            path: truncate_path(&p.path, 40),
            mode: p.mode.to_string(),
            state: format_state_colored(p.state),
            pid: p
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            restarts: p.restarts.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
    println!(
        "{}",
        format!("Total: {} process(es)", processes.len())
            .dimmed()
            .italic()
    );
}

fn format_kind_colored(kind: LifecycleKind) -> String {
    let label = format!("{:<7}", kind.to_string());
    match kind {
        LifecycleKind::Started => label.green().to_string(),
        LifecycleKind::Exited => label.bright_black().to_string(),
        LifecycleKind::Errored => label.red().bold().to_string(),
    }
}

/// Format a lifecycle state with color coding
fn format_state_colored(state: LifecycleState) -> String {
    match state {
        LifecycleState::Running => state.to_string().green().to_string(),
        LifecycleState::Starting => state.to_string().yellow().to_string(),
        LifecycleState::Idle | LifecycleState::Exited => {
            state.to_string().bright_black().to_string()
        }
        LifecycleState::Suspended => state.to_string().red().bold().to_string(),
    }
}

/// Shorten a path from the left, keeping the file name visible
fn truncate_path(path: &Path, max_len: usize) -> String {
    let s = path.display().to_string();
    let count = s.chars().count();
    if count <= max_len {
        s
    } else {
        let tail: String = s.chars().skip(count - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}
