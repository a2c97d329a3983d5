//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use cloudbox_client::PathTree;
use cloudbox_core::events::BulkReport;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("Nothing here.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => print_json(items, "[]"),
    }
}

/// Print a single item in the selected format
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{:#?}", item),
        OutputFormat::Json => print_json(item, "{}"),
    }
}

/// Print a folder tree, one indented line per folder
pub fn print_tree(tree: &PathTree, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(tree, "{}");
        return;
    }
    println!("/");
    for (depth, node) in tree.iter() {
        println!("{}├── {}/", "  ".repeat(depth + 1), node.name);
    }
}

/// Print the outcome of a bulk operation
pub fn print_report(report: &BulkReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(report, "{}");
        return;
    }
    if report.failed.is_empty() {
        print_success(&report.summary());
    } else {
        print_warning(&report.summary());
    }
    for skipped in &report.recoverable {
        println!("  skipped {}: {}", skipped.id, skipped.reason);
    }
    for failed in &report.failed {
        print_error(&format!("{}: {}", failed.id, failed.reason));
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}

fn print_json<T: Serialize + ?Sized>(value: &T, fallback: &str) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string());
    println!("{}", json);
}
