//! Surfaces the renderer can draw on.
//!
//! - [`PageSurface`]: an in-memory page model: input field, live thinking and
//!   response regions, error line and the rendered history list.
//! - [`TerminalSurface`]: streams to a terminal with colored framing, in the
//!   manner of a console stream viewer.

use colored::*;
use std::io::{self, Write};

use crate::protocol::Role;
use crate::renderer::{HistoryEntry, Surface, THINKING_PLACEHOLDER};

// ---------------------------------------------------------------------------
// In-memory page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PageSurface {
    pub input: String,
    pub thinking: String,
    pub response: String,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub history: Vec<HistoryEntry>,
    /// Number of history elements drawn so far, redraws included.
    pub renders: usize,
}

impl PageSurface {
    /// The history list as `role: text` lines, thinking shown only when the
    /// entry's toggle is open.
    pub fn transcript(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for entry in &self.history {
            lines.push(format!("{}: {}", entry.message.role, entry.message.text));
            if let Some(thinking) = entry.thinking.as_deref() {
                if entry.toggle.is_shown() {
                    lines.push(format!("  [thinking] {}", thinking));
                }
            }
        }
        lines
    }
}

impl Surface for PageSurface {
    fn begin_exchange(&mut self, _prompt: &str) {
        self.thinking = THINKING_PLACEHOLDER.to_string();
        self.response.clear();
        self.error = None;
        self.notice = None;
    }

    fn thinking_appended(&mut self, _fragment: &str, thinking: &str) {
        self.thinking = thinking.to_string();
    }

    fn response_appended(&mut self, _fragment: &str, response: &str) {
        self.response = response.to_string();
    }

    fn history_cleared(&mut self) {
        self.history.clear();
    }

    fn message_rendered(&mut self, index: usize, entry: &HistoryEntry) {
        match self.history.get_mut(index) {
            Some(slot) => *slot = entry.clone(),
            None => self.history.push(entry.clone()),
        }
        self.renders += 1;
    }

    fn thinking_toggled(&mut self, index: usize, entry: &HistoryEntry) {
        if let Some(slot) = self.history.get_mut(index) {
            *slot = entry.clone();
        }
    }

    fn clear_input(&mut self) {
        self.input.clear();
    }

    fn show_error(&mut self, text: &str) {
        self.error = Some(text.to_string());
    }

    fn show_notice(&mut self, text: &str) {
        self.notice = Some(text.to_string());
    }
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

pub struct TerminalSurface<W: Write = io::Stdout> {
    out: W,
    show_thinking: bool,
    thinking_open: bool,
    thinking_closed: bool,
    line_open: bool,
}

impl TerminalSurface<io::Stdout> {
    pub fn stdout(show_thinking: bool) -> Self {
        TerminalSurface::new(io::stdout(), show_thinking)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, show_thinking: bool) -> Self {
        TerminalSurface {
            out,
            show_thinking,
            thinking_open: false,
            thinking_closed: false,
            line_open: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn print_banner(&mut self, server: &str, transport: &str) {
        let _ = writeln!(self.out, "{}", "THINKSTREAM".bright_cyan().bold());
        let _ = writeln!(self.out, "{}: {}", "Server".bright_yellow(), server);
        let _ = writeln!(self.out, "{}: {}", "Transport".bright_yellow(), transport);
        let _ = writeln!(
            self.out,
            "{}",
            "Commands: /thinking [n], /history, /quit (// sends a literal /)".bright_blue()
        );
        let _ = writeln!(self.out, "{}", "=".repeat(50).bright_blue());
        let _ = self.out.flush();
    }

    pub fn print_prompt_marker(&mut self) {
        let _ = write!(self.out, "{} ", ">".bright_green().bold());
        let _ = self.out.flush();
    }

    fn end_line(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            self.line_open = false;
        }
    }

    fn close_thinking(&mut self) {
        if self.thinking_open && !self.thinking_closed {
            self.end_line();
            let _ = writeln!(self.out, "{}", "----- End thinking -----".dimmed());
            self.thinking_closed = true;
        }
    }

    fn finish_live(&mut self) {
        self.close_thinking();
        self.end_line();
    }

    fn role_label(role: Role) -> ColoredString {
        let label = format!("{}:", role);
        match role {
            Role::User => label.bright_green().bold(),
            Role::Assistant => label.bright_cyan().bold(),
            Role::System => label.bright_magenta().bold(),
        }
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn begin_exchange(&mut self, _prompt: &str) {
        self.thinking_open = false;
        self.thinking_closed = false;
        self.line_open = false;
        let _ = writeln!(self.out, "{}", THINKING_PLACEHOLDER.dimmed());
        let _ = self.out.flush();
    }

    fn thinking_appended(&mut self, fragment: &str, _thinking: &str) {
        if !self.show_thinking || self.thinking_closed {
            return;
        }
        if !self.thinking_open {
            let _ = writeln!(self.out, "{}", "----- Begin thinking -----".dimmed());
            self.thinking_open = true;
        }
        let _ = write!(self.out, "{}", fragment.italic());
        self.line_open = true;
        let _ = self.out.flush();
    }

    fn response_appended(&mut self, fragment: &str, _response: &str) {
        self.close_thinking();
        let _ = write!(self.out, "{}", fragment);
        self.line_open = true;
        let _ = self.out.flush();
    }

    fn history_cleared(&mut self) {
        self.finish_live();
        let _ = writeln!(self.out, "{}", "----- history -----".bright_blue());
    }

    fn message_rendered(&mut self, _index: usize, entry: &HistoryEntry) {
        self.finish_live();
        let _ = writeln!(
            self.out,
            "{} {}",
            Self::role_label(entry.message.role),
            entry.message.text
        );
        let _ = self.out.flush();
    }

    fn thinking_toggled(&mut self, index: usize, entry: &HistoryEntry) {
        self.finish_live();
        let Some(thinking) = entry.thinking.as_deref() else {
            return;
        };
        if entry.toggle.is_shown() {
            let _ = writeln!(self.out, "{}", "----- Begin thinking -----".dimmed());
            let _ = writeln!(self.out, "{}", thinking.italic());
            let _ = writeln!(self.out, "{}", "----- End thinking -----".dimmed());
        }
        let _ = writeln!(
            self.out,
            "{}",
            format!("[{}: /thinking {}]", entry.toggle.label(), index).dimmed()
        );
        let _ = self.out.flush();
    }

    fn clear_input(&mut self) {
        self.finish_live();
        let _ = self.out.flush();
    }

    fn show_error(&mut self, text: &str) {
        self.finish_live();
        let _ = writeln!(self.out, "{} {}", "error:".bright_red().bold(), text.bright_red());
        let _ = self.out.flush();
    }

    fn show_notice(&mut self, text: &str) {
        self.finish_live();
        let _ = writeln!(self.out, "{}", text.bright_yellow());
        let _ = self.out.flush();
    }

    fn awaiting_input(&mut self) {
        self.finish_live();
        self.print_prompt_marker();
    }
}
