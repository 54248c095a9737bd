use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Color as TermColor;

use crate::error::Error;
use crate::models::Color;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Footer text for a failed operation. Store and file errors already carry a
/// short context as their message; the low-level cause goes to the log.
pub(crate) fn surface_error(err: &Error) -> String {
    match err {
        Error::Store { .. } | Error::Cache { .. } => {
            tracing::warn!(error = ?err, "operation failed");
            err.to_string()
        }
        _ => err.to_string(),
    }
}

/// Terminal color for a song's tag, taken from the palette hex code.
pub(crate) fn tag_color(color: Color) -> TermColor {
    let hex = color.hex().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .unwrap_or(u8::MAX)
    };
    TermColor::Rgb(channel(0..2), channel(2..4), channel(4..6))
}

/// Clamp `current + offset` into `0..len`; 0 for an empty list.
pub(crate) fn step_index(current: usize, offset: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (current as isize + offset).clamp(0, len as isize - 1) as usize
}

/// First visible row so that `selected` stays inside a window of `capacity`.
pub(crate) fn scroll_start(selected: usize, capacity: usize, len: usize) -> usize {
    let capacity = capacity.max(1);
    let start = (selected + 1).saturating_sub(capacity);
    start.min(len.saturating_sub(capacity))
}
