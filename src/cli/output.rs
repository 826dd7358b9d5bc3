//! Output formatting for junos-txn
//!
//! Human output is colored unless disabled or `NO_COLOR` is set; JSON output
//! prints one object per result.

use colored::Colorize;
use serde::Serialize;

/// Output formatter for the selected output mode
pub struct OutputFormatter {
    use_color: bool,
    json_mode: bool,
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether JSON mode is active
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a serializable result as JSON
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => self.error(&format!("Failed to serialize output: {}", e)),
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }
        if self.use_color {
            println!("{}", title.cyan().bold());
        } else {
            println!("{}", title);
        }
    }

    /// Print a `key: value` line
    pub fn field(&self, key: &str, value: &str) {
        if self.use_color {
            println!("  {:<16} {}", format!("{}:", key).bold(), value);
        } else {
            println!("  {:<16} {}", format!("{}:", key), value);
        }
    }

    /// Print raw text unchanged
    pub fn text(&self, text: &str) {
        println!("{}", text.trim_end());
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.use_color {
            println!("{} {}", "OK:".green().bold(), message);
        } else {
            println!("OK: {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", serde_json::json!({ "type": "error", "message": message }));
            return;
        }
        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", serde_json::json!({ "type": "warning", "message": message }));
            return;
        }
        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }
        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }
}
