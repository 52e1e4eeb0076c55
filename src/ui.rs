//! Terminal styling helpers shared by the picker frame and plain CLI output.

use std::io::{self, IsTerminal};
use std::sync::OnceLock;

fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if std::env::var("TERM")
            .map(|term| term.eq_ignore_ascii_case("dumb"))
            .unwrap_or(false)
        {
            return false;
        }

        io::stdout().is_terminal()
    })
}

fn paint(value: &str, code: &str) -> String {
    if colors_enabled() {
        format!("\x1b[{code}m{value}\x1b[0m")
    } else {
        value.to_string()
    }
}

/// Styles the prompt line.
pub fn label(value: &str) -> String {
    paint(value, "1;36")
}

/// Styles the row under the cursor.
pub fn highlight(value: &str) -> String {
    paint(value, "7")
}

/// Styles a checked topic's process index glyph.
pub fn group_index(value: &str) -> String {
    paint(value, "1;32")
}

/// Styles dimmed chrome such as scroll indicators and key hints.
pub fn muted(value: &str) -> String {
    paint(value, "2;37")
}

/// Styles a warning message.
pub fn warning(value: &str) -> String {
    paint(value, "1;33")
}

/// Styles an error message.
pub fn error(value: &str) -> String {
    paint(value, "1;31")
}

pub fn truncate(value: &str, max_len: usize) -> String {
    let value_len = value.chars().count();
    if value_len <= max_len {
        return value.to_string();
    }
    if max_len <= 1 {
        return "…".to_string();
    }
    let mut output: String = value.chars().take(max_len - 1).collect();
    output.push('…');
    output
}

pub fn pad(value: &str, width: usize) -> String {
    let current = value.chars().count();
    if current >= width {
        value.to_string()
    } else {
        format!("{value}{}", " ".repeat(width - current))
    }
}
