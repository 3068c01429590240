//! Terminal capability detection and utilities

use owo_colors::{colors::css, OwoColorize};

/// Detects whether colored output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Detects terminal width, returning None if not available
pub fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Check if terminal is narrow (< 60 columns)
pub fn is_narrow() -> bool {
    terminal_width().is_some_and(|w| w < 60)
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as success (green)
    fn success(&self) -> String;
    /// Color as warning (amber)
    fn warning(&self) -> String;
    /// Color as info (blue)
    fn info(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        let text = self.as_ref();
        if supports_color() {
            text.fg::<css::Green>().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self) -> String {
        let text = self.as_ref();
        if supports_color() {
            text.fg::<css::Orange>().to_string()
        } else {
            text.to_string()
        }
    }

    fn info(&self) -> String {
        let text = self.as_ref();
        if supports_color() {
            text.fg::<css::LightBlue>().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self) -> String {
        let text = self.as_ref();
        if supports_color() {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}
