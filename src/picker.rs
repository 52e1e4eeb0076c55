//! Interactive topic picker: key handling, scrolling, and the terminal loop.

use std::io::{stdout, Write};

use anyhow::{Context, Result};
use crossterm::cursor;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use tracing::debug;

use crate::render::{frame_lines, render, View};
use crate::selection::{Checklist, Direction};

/// Prompt, two scroll indicators, and the hint line.
const CHROME_ROWS: usize = 4;
const EMPTY_COMMIT_WARNING: &str = "select at least one topic before pressing enter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Toggle,
    Commit,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Commit,
    Cancel,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Selection {
    Committed(Checklist),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Picker {
    checklist: Checklist,
    cursor: usize,
    offset: usize,
    window: usize,
    flash: Option<String>,
}

impl Picker {
    pub fn new(checklist: Checklist, window: usize) -> Self {
        Self {
            checklist,
            cursor: 0,
            offset: 0,
            window: window.max(1),
            flash: None,
        }
    }

    pub fn view(&self) -> View<'_> {
        View {
            checklist: &self.checklist,
            cursor: self.cursor,
            offset: self.offset,
            window: self.window,
            flash: self.flash.as_deref(),
        }
    }

    pub fn handle(&mut self, key: Key) -> Outcome {
        self.flash = None;
        let page = self.window;

        match key {
            Key::Up => self.move_cursor_by(-1),
            Key::Down => self.move_cursor_by(1),
            Key::PageUp => self.move_cursor_by(-(page as isize)),
            Key::PageDown => self.move_cursor_by(page as isize),
            Key::Home => self.move_cursor_to(0),
            Key::End => self.move_cursor_to(self.checklist.len().saturating_sub(1)),
            Key::Toggle => {
                self.checklist.toggle(self.cursor);
            }
            Key::Left => {
                self.checklist.shift_index(self.cursor, Direction::Left);
            }
            Key::Right => {
                self.checklist.shift_index(self.cursor, Direction::Right);
            }
            Key::Commit => {
                if self.checklist.checked_count() == 0 {
                    self.flash = Some(EMPTY_COMMIT_WARNING.to_string());
                } else {
                    return Outcome::Commit;
                }
            }
            Key::Interrupt => return Outcome::Cancel,
        }

        Outcome::Continue
    }

    /// Applies a new window height, keeping the cursor on screen.
    pub fn resize(&mut self, window: usize) {
        self.window = window.max(1);
        let max_offset = self.checklist.len().saturating_sub(self.window);
        self.offset = self.offset.min(max_offset);
        self.scroll_to_cursor();
    }

    pub fn into_checklist(self) -> Checklist {
        self.checklist
    }

    fn move_cursor_by(&mut self, delta: isize) {
        let last = self.checklist.len().saturating_sub(1);
        let target = self.cursor.saturating_add_signed(delta).min(last);
        self.move_cursor_to(target);
    }

    fn move_cursor_to(&mut self, position: usize) {
        self.cursor = position.min(self.checklist.len().saturating_sub(1));
        self.scroll_to_cursor();
    }

    fn scroll_to_cursor(&mut self) {
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + self.window {
            self.offset = self.cursor + 1 - self.window;
        }
    }
}

pub fn key_from_event(key: KeyEvent) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
            .then_some(Key::Interrupt);
    }

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Key::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Key::Down),
        KeyCode::Left | KeyCode::Char('h') => Some(Key::Left),
        KeyCode::Right | KeyCode::Char('l') => Some(Key::Right),
        KeyCode::Home => Some(Key::Home),
        KeyCode::End => Some(Key::End),
        KeyCode::PageUp => Some(Key::PageUp),
        KeyCode::PageDown => Some(Key::PageDown),
        KeyCode::Char(' ') => Some(Key::Toggle),
        KeyCode::Enter => Some(Key::Commit),
        _ => None,
    }
}

fn window_for_height(rows: u16) -> usize {
    (rows as usize).saturating_sub(CHROME_ROWS).max(1)
}

/// Runs the picker until the user commits or cancels. Blocks on one terminal
/// event per iteration.
pub fn run(checklist: Checklist) -> Result<Selection> {
    let _guard = TerminalGuard::enter()?;
    let (_, rows) = terminal::size().context("failed reading terminal size")?;
    let mut picker = Picker::new(checklist, window_for_height(rows));
    let mut needs_full_clear = true;

    loop {
        draw_frame(&picker, needs_full_clear)?;
        needs_full_clear = false;

        match event::read().context("failed reading terminal input")? {
            Event::Key(key) => {
                let Some(key) = key_from_event(key) else {
                    continue;
                };
                match picker.handle(key) {
                    Outcome::Continue => {}
                    Outcome::Commit => {
                        debug!("selection committed");
                        return Ok(Selection::Committed(picker.into_checklist()));
                    }
                    Outcome::Cancel => {
                        debug!("selection cancelled");
                        return Ok(Selection::Cancelled);
                    }
                }
            }
            Event::Resize(_, rows) => {
                picker.resize(window_for_height(rows));
                needs_full_clear = true;
            }
            _ => {}
        }
    }
}

fn draw_frame(picker: &Picker, clear_all: bool) -> Result<()> {
    let (width, _) = terminal::size().context("failed reading terminal size")?;
    let frame = render(&picker.view());

    // No newline after the last line, or a full-height frame would scroll.
    let buffer = frame_lines(&frame, width as usize).join("\x1b[K\r\n");

    let mut out = stdout();
    execute!(out, cursor::MoveTo(0, 0)).context("failed moving cursor")?;
    if clear_all {
        execute!(out, Clear(ClearType::All)).context("failed clearing terminal frame")?;
    }
    out.write_all(buffer.as_bytes()).context("failed writing picker frame")?;
    execute!(out, Clear(ClearType::FromCursorDown)).context("failed clearing trailing area")?;
    out.flush().context("failed flushing terminal frame")?;
    Ok(())
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed enabling raw mode")?;
        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, cursor::Hide) {
            let _ = disable_raw_mode();
            return Err(err).context("failed entering alternate screen");
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut out = stdout();
        let _ = execute!(out, cursor::Show, LeaveAlternateScreen);
    }
}
