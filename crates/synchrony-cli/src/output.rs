//! Console output
//!
//! Human mode prints status lines. JSON mode keeps stdout for the single
//! result document and sends problems to stderr as one JSON object per line,
//! so the output can be piped.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format.is_json()
    }

    /// Headline for a finished command
    pub fn success(&self, message: &str) {
        if !self.is_json() {
            println!("\u{2713} {message}");
        }
    }

    /// Indented detail under the last headline
    pub fn detail(&self, message: &str) {
        if !self.is_json() {
            println!("  {message}");
        }
    }

    pub fn warn(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\u{26a0} {message}"),
            OutputFormat::Json => {
                eprintln!("{}", serde_json::json!({"level": "warning", "message": message}))
            }
        }
    }

    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\u{2717} {message}"),
            OutputFormat::Json => {
                eprintln!("{}", serde_json::json!({"level": "error", "message": message}))
            }
        }
    }

    /// The command's result document, JSON mode only
    pub fn document<T: Serialize>(&self, value: &T) -> serde_json::Result<()> {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }
}

/// `"1 file"`, `"3 files"`
pub fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

pub fn duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}
