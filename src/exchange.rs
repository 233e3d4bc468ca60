//! One prompt/reply exchange and its state machine.
//!
//! ```text
//! idle ──submit──▶ streaming ──complete──▶ complete ──▶ idle
//!                      │
//!                      └──────fail───────▶ errored  ──▶ idle
//! ```
//!
//! The renderer holds at most one [`Exchange`]. Once it leaves `streaming` it is
//! handed back to the caller and the renderer is idle again.

use uuid::Uuid;

use crate::error::ChatError;
use crate::protocol::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        ExchangeId(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    Idle,
    Streaming,
    Complete,
    Errored,
}

impl std::fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeStatus::Idle => write!(f, "idle"),
            ExchangeStatus::Streaming => write!(f, "streaming"),
            ExchangeStatus::Complete => write!(f, "complete"),
            ExchangeStatus::Errored => write!(f, "errored"),
        }
    }
}

/// A validated prompt: trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(input: &str) -> Option<Prompt> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Prompt(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fragments actually appended by one chunk, in application order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Applied<'a> {
    pub thinking: Option<&'a str>,
    pub text: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Exchange {
    id: ExchangeId,
    prompt: Prompt,
    thinking: String,
    response: String,
    status: ExchangeStatus,
}

impl Exchange {
    /// Create an exchange that is already streaming.
    pub fn start(prompt: Prompt) -> Self {
        Exchange {
            id: ExchangeId::new(),
            prompt,
            thinking: String::new(),
            response: String::new(),
            status: ExchangeStatus::Streaming,
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn status(&self) -> ExchangeStatus {
        self.status
    }

    pub fn is_streaming(&self) -> bool {
        self.status == ExchangeStatus::Streaming
    }

    /// Append a chunk's thinking fragment, then its text fragment.
    pub fn apply<'c>(&mut self, chunk: &'c Chunk) -> Result<Applied<'c>, ChatError> {
        self.require_streaming("apply a chunk to")?;
        let thinking = chunk.thinking.as_deref().filter(|s| !s.is_empty());
        let text = chunk.text.as_deref().filter(|s| !s.is_empty());
        if let Some(fragment) = thinking {
            self.thinking.push_str(fragment);
        }
        if let Some(fragment) = text {
            self.response.push_str(fragment);
        }
        Ok(Applied { thinking, text })
    }

    pub fn complete(&mut self) -> Result<(), ChatError> {
        self.require_streaming("complete")?;
        self.status = ExchangeStatus::Complete;
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), ChatError> {
        self.require_streaming("fail")?;
        self.status = ExchangeStatus::Errored;
        Ok(())
    }

    fn require_streaming(&self, event: &'static str) -> Result<(), ChatError> {
        if self.is_streaming() {
            Ok(())
        } else {
            Err(ChatError::InvalidTransition { from: self.status, event })
        }
    }
}
