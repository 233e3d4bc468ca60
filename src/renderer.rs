//! Stream renderer: applies one exchange's lifecycle to a [`Surface`].
//!
//! The renderer owns the active [`Exchange`] and the list of history entries it
//! has already drawn. It never talks to a transport; the session feeds it the
//! events a transport produced, in delivery order.

use tracing::debug;

use crate::error::ChatError;
use crate::exchange::{Exchange, ExchangeId, ExchangeStatus, Prompt};
use crate::protocol::{Chunk, ErrorInfo, HistorySnapshot, Message, Role};

/// Placeholder shown in the live thinking region until the first fragment.
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// Visibility of a rendered message's reasoning region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThinkingToggle {
    #[default]
    Hidden,
    Shown,
}

impl ThinkingToggle {
    pub fn flip(self) -> Self {
        match self {
            ThinkingToggle::Hidden => ThinkingToggle::Shown,
            ThinkingToggle::Shown => ThinkingToggle::Hidden,
        }
    }

    /// Label of the control that would flip the current state.
    pub fn label(self) -> &'static str {
        match self {
            ThinkingToggle::Hidden => "Show thinking",
            ThinkingToggle::Shown => "Hide thinking",
        }
    }

    pub fn is_shown(self) -> bool {
        self == ThinkingToggle::Shown
    }
}

/// A history message as drawn, with its optional reasoning region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub message: Message,
    pub thinking: Option<String>,
    pub toggle: ThinkingToggle,
}

impl HistoryEntry {
    fn new(message: Message) -> Self {
        HistoryEntry { message, thinking: None, toggle: ThinkingToggle::Hidden }
    }
}

/// Where the renderer draws. Implementations only present; they hold no
/// exchange state of their own.
pub trait Surface {
    /// A new exchange started: show the placeholder, empty the response
    /// region, clear any previous error.
    fn begin_exchange(&mut self, prompt: &str);

    /// `fragment` was appended; `thinking` is the full accumulated text.
    fn thinking_appended(&mut self, fragment: &str, thinking: &str);

    /// `fragment` was appended; `response` is the full accumulated text.
    fn response_appended(&mut self, fragment: &str, response: &str);

    /// The rendered history no longer matches the backend and is redrawn.
    fn history_cleared(&mut self);

    fn message_rendered(&mut self, index: usize, entry: &HistoryEntry);

    fn thinking_toggled(&mut self, index: usize, entry: &HistoryEntry);

    fn clear_input(&mut self);

    fn show_error(&mut self, text: &str);

    /// Non-fatal status line, e.g. a rejected submission.
    fn show_notice(&mut self, text: &str);

    /// The session is idle and waiting for the next line of input.
    fn awaiting_input(&mut self) {}
}

/// Result of a submission attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank input; nothing happened.
    Ignored,
    /// A new exchange is streaming and should be sent to the transport.
    Started { id: ExchangeId, prompt: String },
}

pub struct StreamRenderer<S: Surface> {
    surface: S,
    active: Option<Exchange>,
    history: Vec<HistoryEntry>,
}

impl<S: Surface> StreamRenderer<S> {
    pub fn new(surface: S) -> Self {
        StreamRenderer { surface, active: None, history: Vec::new() }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn active(&self) -> Option<&Exchange> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<ExchangeId> {
        self.active.as_ref().map(Exchange::id)
    }

    pub fn status(&self) -> ExchangeStatus {
        self.active.as_ref().map_or(ExchangeStatus::Idle, Exchange::status)
    }

    /// Start a new exchange for `input`.
    ///
    /// Blank input is ignored. A submission while another exchange is
    /// streaming is rejected with [`ChatError::ExchangeActive`] and leaves the
    /// active exchange untouched.
    pub fn submit(&mut self, input: &str) -> Result<Submission, ChatError> {
        let Some(prompt) = Prompt::parse(input) else {
            return Ok(Submission::Ignored);
        };
        if self.active.is_some() {
            self.surface.show_notice("A response is still streaming; wait for it to finish.");
            return Err(ChatError::ExchangeActive);
        }

        let exchange = Exchange::start(prompt);
        let started = Submission::Started {
            id: exchange.id(),
            prompt: exchange.prompt().to_string(),
        };
        debug!(exchange = %exchange.id(), "exchange started");
        self.surface.begin_exchange(exchange.prompt().as_str());
        self.active = Some(exchange);
        Ok(started)
    }

    pub fn on_chunk(&mut self, chunk: &Chunk) -> Result<(), ChatError> {
        let exchange = self.active.as_mut().ok_or(ChatError::NoActiveExchange)?;
        let applied = exchange.apply(chunk)?;
        if let Some(fragment) = applied.thinking {
            self.surface.thinking_appended(fragment, exchange.thinking());
        }
        if let Some(fragment) = applied.text {
            self.surface.response_appended(fragment, exchange.response());
        }
        Ok(())
    }

    /// Apply a batch in its delivered order.
    pub fn on_chunks(&mut self, chunks: &[Chunk]) -> Result<(), ChatError> {
        if self.active.is_none() {
            return Err(ChatError::NoActiveExchange);
        }
        for chunk in chunks {
            self.on_chunk(chunk)?;
        }
        Ok(())
    }

    /// Finish the active exchange and bring the history in line with
    /// `snapshot`. Returns the finalized exchange.
    pub fn on_complete(&mut self, snapshot: HistorySnapshot) -> Result<Exchange, ChatError> {
        let mut exchange = self.active.take().ok_or(ChatError::NoActiveExchange)?;
        exchange.complete()?;

        let first_new = self.sync_history(snapshot.messages);
        if !exchange.thinking().is_empty() {
            let target = (first_new..self.history.len())
                .rev()
                .find(|&i| self.history[i].message.role == Role::Assistant);
            if let Some(i) = target {
                self.history[i].thinking = Some(exchange.thinking().to_string());
                self.surface.thinking_toggled(i, &self.history[i]);
            }
        }

        self.surface.clear_input();
        debug!(exchange = %exchange.id(), history = self.history.len(), "exchange complete");
        Ok(exchange)
    }

    /// Fail the active exchange. Partial text and history are left as drawn.
    pub fn on_error(&mut self, info: &ErrorInfo) -> Result<Exchange, ChatError> {
        let mut exchange = self.active.take().ok_or(ChatError::NoActiveExchange)?;
        exchange.fail()?;
        self.surface.show_error(info.display_text());
        debug!(exchange = %exchange.id(), error = info.display_text(), "exchange errored");
        Ok(exchange)
    }

    /// Drop the active exchange without a terminal event, e.g. when its
    /// transport was aborted. Nothing is drawn.
    pub fn abandon(&mut self) -> Option<Exchange> {
        let mut exchange = self.active.take()?;
        // Only a streaming exchange is ever held, so this cannot fail.
        let _ = exchange.fail();
        Some(exchange)
    }

    /// Flip the reasoning region of history entry `index`. Returns the new
    /// state, or `None` when the entry does not exist or has no thinking.
    pub fn toggle_thinking(&mut self, index: usize) -> Option<ThinkingToggle> {
        let entry = self.history.get_mut(index)?;
        entry.thinking.as_ref()?;
        entry.toggle = entry.toggle.flip();
        let toggle = entry.toggle;
        self.surface.thinking_toggled(index, &self.history[index]);
        Some(toggle)
    }

    /// Index of the most recent entry that carries thinking.
    pub fn latest_with_thinking(&self) -> Option<usize> {
        self.history.iter().rposition(|e| e.thinking.is_some())
    }

    /// Draw every history entry again, e.g. after the terminal scrolled.
    pub fn redraw_history(&mut self) {
        self.surface.history_cleared();
        for (i, entry) in self.history.iter().enumerate() {
            self.surface.message_rendered(i, entry);
        }
    }

    /// Render only the messages not drawn yet. Returns the index of the first
    /// newly drawn entry.
    fn sync_history(&mut self, messages: Vec<Message>) -> usize {
        let seen = self.history.len();
        let is_extension = messages.len() >= seen
            && self.history.iter().zip(&messages).all(|(e, m)| e.message == *m);

        let start = if is_extension {
            seen
        } else {
            debug!(rendered = seen, incoming = messages.len(), "history diverged, redrawing");
            self.history.clear();
            self.surface.history_cleared();
            0
        };

        for message in messages.into_iter().skip(start) {
            self.history.push(HistoryEntry::new(message));
            let i = self.history.len() - 1;
            self.surface.message_rendered(i, &self.history[i]);
        }
        start
    }
}
