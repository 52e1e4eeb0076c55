//! Pure mapping from picker state to the rows drawn on screen.

use crate::selection::Checklist;
use crate::ui;

pub const PROMPT: &str = "Choose topics to record:";
pub const HINTS: &str = "space toggle · ←/→ process · ↑/↓ move · enter record · ctrl+c cancel";
const UP_INDICATOR: &str = "↑ ↑ ↑";
const DOWN_INDICATOR: &str = "↓ ↓ ↓";
const CURSOR_MARK: &str = "▸";
const ROW_INDENT: usize = 2;

/// Everything a frame depends on, borrowed for the duration of one draw.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub checklist: &'a Checklist,
    pub cursor: usize,
    pub offset: usize,
    pub window: usize,
    pub flash: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub check: &'static str,
    pub index: String,
    pub topic: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub more_above: bool,
    pub rows: Vec<Row>,
    pub more_below: bool,
    pub flash: Option<String>,
    /// Rows the window reserves; shorter lists leave the rest blank.
    pub window: usize,
}

pub fn render(view: &View<'_>) -> Frame {
    let total = view.checklist.len();
    let end = total.min(view.offset.saturating_add(view.window));
    let rows = view
        .checklist
        .entries()
        .iter()
        .enumerate()
        .take(end)
        .skip(view.offset)
        .map(|(position, entry)| Row {
            check: if entry.checked { "[x]" } else { "[ ]" },
            index: entry
                .process_index
                .map(|index| format!("[{index}]"))
                .unwrap_or_else(|| "[-]".to_string()),
            topic: entry.topic.clone(),
            highlighted: position == view.cursor,
        })
        .collect();

    Frame {
        more_above: view.offset > 0,
        rows,
        more_below: view.offset.saturating_add(view.window) < total,
        flash: view.flash.map(str::to_string),
        window: view.window,
    }
}

/// Turns a frame into terminal lines no wider than `width` visible columns.
pub fn frame_lines(frame: &Frame, width: usize) -> Vec<String> {
    let index_width = frame
        .rows
        .iter()
        .map(|row| row.index.chars().count())
        .max()
        .unwrap_or(3);
    let indicator_indent = " ".repeat(ROW_INDENT + CURSOR_MARK.chars().count() + 1);

    let mut lines = Vec::with_capacity(frame.window + 4);
    lines.push(ui::label(&ui::truncate(PROMPT, width)));
    lines.push(if frame.more_above {
        ui::muted(&format!("{indicator_indent}{UP_INDICATOR}"))
    } else {
        String::new()
    });

    for row in &frame.rows {
        let mark = if row.highlighted { CURSOR_MARK } else { " " };
        let prefix = format!(
            "{}{mark} {} {} ",
            " ".repeat(ROW_INDENT),
            row.check,
            ui::pad(&row.index, index_width)
        );
        let budget = width.saturating_sub(prefix.chars().count());
        let text = format!("{prefix}{}", ui::truncate(&row.topic, budget));
        let line = if row.highlighted {
            ui::highlight(&text)
        } else if row.index != "[-]" {
            let styled_index = ui::group_index(&row.index);
            text.replacen(&row.index, &styled_index, 1)
        } else {
            text
        };
        lines.push(line);
    }
    for _ in frame.rows.len()..frame.window {
        lines.push(String::new());
    }

    lines.push(if frame.more_below {
        ui::muted(&format!("{indicator_indent}{DOWN_INDICATOR}"))
    } else {
        String::new()
    });
    lines.push(match frame.flash.as_deref() {
        Some(message) => ui::warning(&ui::truncate(message, width)),
        None => ui::muted(&ui::truncate(HINTS, width)),
    });

    lines
}
