//! Terminal output for CLI commands.

use serde::Serialize;
use serde_json::Value;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned `key: value` lines
    #[default]
    Table,
    /// Pretty-printed JSON, for scripting
    Json,
}

/// Render one serializable record.
///
/// In table form, top-level object fields become `key: value` lines and
/// nested values are printed as compact JSON.
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) {
    let value = match serde_json::to_value(item) {
        Ok(value) => value,
        Err(e) => {
            print_error(&format!("Cannot render output: {}", e));
            return;
        }
    };
    match (format, &value) {
        (OutputFormat::Json, _) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        }
        (OutputFormat::Table, Value::Object(fields)) => {
            for (key, field) in fields {
                print_kv(key, &display_value(field));
            }
        }
        (OutputFormat::Table, other) => println!("{}", display_value(other)),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print an indented, aligned key/value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<20} {}", format!("{}:", key), value);
}
