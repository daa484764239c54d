//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or the serializable value as JSON
pub fn print_rows<T: Tabled, S: Serialize + ?Sized>(rows: Vec<T>, json: &S, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(out) = serde_json::to_string_pretty(json) {
                println!("{}", out);
            }
        }
    }
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: i64) -> String {
    const KI: f64 = 1024.0;
    const MI: f64 = KI * 1024.0;
    const GI: f64 = MI * 1024.0;

    let value = bytes as f64;
    if value >= GI {
        format!("{:.2}Gi", value / GI)
    } else if value >= MI {
        format!("{:.2}Mi", value / MI)
    } else if value >= KI {
        format!("{:.2}Ki", value / KI)
    } else {
        format!("{}", bytes)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: i64) -> String {
    if millicores >= 1000 && millicores % 1000 == 0 {
        format!("{}", millicores / 1000)
    } else if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format a resource total for display according to its unit
pub fn format_resource(resource: &str, value: i64) -> String {
    match resource {
        "cpu" => format_cpu(value),
        "memory" | "ephemeral-storage" => format_bytes(value),
        _ => value.to_string(),
    }
}

/// Format a ratio as percentage
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Color a verdict code
pub fn color_verdict(verdict: &str) -> String {
    match verdict {
        "success" => verdict.green().to_string(),
        "unschedulable" => verdict.yellow().to_string(),
        "error" => verdict.red().to_string(),
        _ => verdict.to_string(),
    }
}

/// Color a utilization ratio relative to the threshold
pub fn color_utilization(utilization: f64, threshold: f64) -> String {
    let formatted = format_ratio(utilization);
    if utilization > threshold {
        formatted.red().to_string()
    } else if utilization > threshold * 0.85 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}
