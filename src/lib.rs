//! Streaming chat client that renders a model's reply as it arrives, with a
//! separate thinking region that collapses into a per-message toggle once the
//! reply is complete.
//!
//! - [`renderer`] drives one exchange's lifecycle onto a [`renderer::Surface`].
//! - [`transport`] delivers chunks, history and errors over push, SSE, a
//!   single request/response call, or a local mock.
//! - [`session`] connects the two and reads user input.

pub mod cli;
pub mod config;
pub mod error;
pub mod exchange;
pub mod protocol;
pub mod renderer;
pub mod session;
pub mod surface;
pub mod transport;

pub use config::Config;
pub use error::ChatError;
pub use exchange::{Exchange, ExchangeId, ExchangeStatus, Prompt};
pub use protocol::{Chunk, ErrorInfo, HistorySnapshot, Message, Role};
pub use renderer::{HistoryEntry, StreamRenderer, Submission, Surface, ThinkingToggle};
pub use session::{Command, Session};
pub use surface::{PageSurface, TerminalSurface};
pub use transport::{Transport, TransportKind};
