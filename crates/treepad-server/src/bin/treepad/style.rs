//! Terminal colouring for CLI output.

use std::io::IsTerminal;

use owo_colors::{AnsiColors, OwoColorize};

fn paint(text: &str, color: AnsiColors, tty: bool) -> String {
    if tty {
        text.color(color).to_string()
    } else {
        text.to_string()
    }
}

pub fn success(text: impl AsRef<str>) -> String {
    paint(text.as_ref(), AnsiColors::Green, std::io::stdout().is_terminal())
}

pub fn error(text: impl AsRef<str>) -> String {
    paint(text.as_ref(), AnsiColors::Red, std::io::stderr().is_terminal())
}

pub fn accent(text: impl AsRef<str>) -> String {
    paint(text.as_ref(), AnsiColors::Cyan, std::io::stdout().is_terminal())
}

pub fn muted(text: impl AsRef<str>) -> String {
    paint(text.as_ref(), AnsiColors::BrightBlack, std::io::stdout().is_terminal())
}
