//! Terminal display styles.
//!
//! Only named ANSI colors are used so output adapts to the user's terminal
//! theme. Emphasis comes from `Attribute::Dim` / `Attribute::Bold`, never
//! from bright or RGB variants.

use crossterm::style::{Attribute, Color, ContentStyle};

/// Block labels such as `exec`, `thinking`, `tokens used`.
pub fn label() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Magenta),
        attributes: Attribute::Bold.into(),
        ..Default::default()
    }
}

/// Thread lifecycle headers (`thread started`, `thread request`).
pub fn thread_header() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Cyan),
        attributes: Attribute::Bold.into(),
        ..Default::default()
    }
}

/// Secondary detail lines (session id, exit code 0, token counts).
pub fn dim() -> ContentStyle {
    ContentStyle {
        attributes: Attribute::Dim.into(),
        ..Default::default()
    }
}

pub fn error() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Red),
        ..Default::default()
    }
}
