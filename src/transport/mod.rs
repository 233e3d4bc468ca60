//! Transport adapters: interchangeable producers of exchange events.
//!
//! Every adapter runs as one task per exchange and emits, in order, zero or
//! more chunk batches followed by exactly one terminal event. The session is
//! the only consumer; it never learns which adapter is in use.

pub mod fetch;
pub mod mock;
pub mod push;
pub mod sse;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::exchange::ExchangeId;
use crate::protocol::{Chunk, ErrorInfo, HistorySnapshot};

pub use fetch::FetchTransport;
pub use mock::MockTransport;
pub use push::PushTransport;
pub use sse::SseTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket push channel
    Push,
    /// Server-Sent Events pull stream
    Sse,
    /// Single JSON request/response
    Fetch,
    /// Local timer-driven simulation
    Mock,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Push => write!(f, "push"),
            TransportKind::Sse => write!(f, "sse"),
            TransportKind::Fetch => write!(f, "fetch"),
            TransportKind::Mock => write!(f, "mock"),
        }
    }
}

// -- Events -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Chunks(Vec<Chunk>),
    Complete(HistorySnapshot),
    Error(ErrorInfo),
}

impl Delivery {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Delivery::Chunks(_))
    }
}

/// A delivery tagged with the exchange it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub exchange: ExchangeId,
    pub delivery: Delivery,
}

/// Write end of the event channel for one exchange.
///
/// Drops everything sent after the first terminal event, so a misbehaving
/// backend cannot finish an exchange twice.
pub struct EventSink {
    exchange: ExchangeId,
    tx: mpsc::UnboundedSender<TransportEvent>,
    finished: bool,
}

impl EventSink {
    pub fn new(exchange: ExchangeId, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        EventSink { exchange, tx, finished: false }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn chunks(&mut self, chunks: Vec<Chunk>) {
        if chunks.is_empty() {
            return;
        }
        self.send(Delivery::Chunks(chunks));
    }

    pub fn complete(&mut self, snapshot: HistorySnapshot) {
        self.send(Delivery::Complete(snapshot));
    }

    pub fn error(&mut self, info: ErrorInfo) {
        self.send(Delivery::Error(info));
    }

    fn send(&mut self, delivery: Delivery) {
        if self.finished {
            debug!(exchange = %self.exchange, "dropping delivery after terminal event");
            return;
        }
        self.finished = delivery.is_terminal();
        // The receiver is gone only when the session shut down.
        let _ = self.tx.send(TransportEvent { exchange: self.exchange, delivery });
    }
}

// -- Dispatch ---------------------------------------------------------------

pub enum Transport {
    Push(PushTransport),
    Sse(SseTransport),
    Fetch(FetchTransport),
    Mock(MockTransport),
}

impl Transport {
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        Ok(match config.transport {
            TransportKind::Push => Transport::Push(PushTransport::new(config.push_url()?)),
            TransportKind::Sse => Transport::Sse(SseTransport::new(config)?),
            TransportKind::Fetch => Transport::Fetch(FetchTransport::new(config)?),
            TransportKind::Mock => Transport::Mock(MockTransport::new(config.mock.clone())),
        })
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Push(_) => TransportKind::Push,
            Transport::Sse(_) => TransportKind::Sse,
            Transport::Fetch(_) => TransportKind::Fetch,
            Transport::Mock(_) => TransportKind::Mock,
        }
    }

    /// Drive one exchange to its terminal event. Failures are converted to a
    /// visible error here and never escape the task.
    pub async fn run(&self, prompt: String, mut sink: EventSink) {
        let exchange = sink.exchange();
        debug!(%exchange, transport = %self.kind(), "transport started");

        let result = match self {
            Transport::Push(t) => t.deliver(&prompt, &mut sink).await,
            Transport::Sse(t) => t.deliver(&prompt, &mut sink).await,
            Transport::Fetch(t) => t.deliver(&prompt, &mut sink).await,
            Transport::Mock(t) => t.deliver(&prompt, &mut sink).await,
        };

        match result {
            Ok(()) if sink.is_finished() => {}
            Ok(()) => {
                warn!(%exchange, "transport ended without a terminal event");
                sink.error(ChatError::StreamClosed.to_error_info());
            }
            Err(e) => {
                warn!(%exchange, error = %e, "transport failed");
                sink.error(e.to_error_info());
            }
        }
    }

    /// Run the exchange on its own task.
    pub fn spawn(
        transport: &Arc<Transport>,
        exchange: ExchangeId,
        prompt: String,
        tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(transport);
        let sink = EventSink::new(exchange, tx);
        tokio::spawn(async move { transport.run(prompt, sink).await })
    }
}

/// Join `path` onto a base URL without doubling the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Turn a non-success HTTP response into a backend error, keeping the
/// backend's own message when the body carries one.
pub(crate) async fn backend_error(response: reqwest::Response) -> ChatError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorInfo>(&body) {
        Ok(info) => ChatError::Backend(info.error),
        Err(_) => {
            warn!(%status, "backend returned a non-JSON error body");
            ChatError::Backend(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use crate::protocol::Role;

    fn sink() -> (EventSink, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(ExchangeId::new(), tx), rx)
    }

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Push.to_string(), "push");
        assert_eq!(TransportKind::Sse.to_string(), "sse");
        assert_eq!(TransportKind::Fetch.to_string(), "fetch");
        assert_eq!(TransportKind::Mock.to_string(), "mock");
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("http://h:1", "/stream"), "http://h:1/stream");
        assert_eq!(endpoint("http://h:1/", "/stream"), "http://h:1/stream");
        assert_eq!(endpoint("http://h:1/api/", "messages"), "http://h:1/api/messages");
    }

    #[test]
    fn test_sink_tags_exchange() {
        let (mut sink, mut rx) = sink();
        let id = sink.exchange();
        sink.chunks(vec![Chunk::text("a")]);
        let ev = rx.try_recv().expect("event");
        assert_eq!(ev.exchange, id);
        assert_eq!(ev.delivery, Delivery::Chunks(vec![Chunk::text("a")]));
    }

    #[test]
    fn test_sink_skips_empty_batches() {
        let (mut sink, mut rx) = sink();
        sink.chunks(Vec::new());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sink_drops_after_terminal() {
        let (mut sink, mut rx) = sink();
        sink.complete(HistorySnapshot {
            messages: vec![Message::new(Role::User, "hi")],
        });
        sink.chunks(vec![Chunk::text("late")]);
        sink.error(ErrorInfo::new("late"));
        assert!(sink.is_finished());
        assert!(matches!(rx.try_recv().expect("event").delivery, Delivery::Complete(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delivery_is_terminal() {
        assert!(!Delivery::Chunks(vec![]).is_terminal());
        assert!(Delivery::Complete(HistorySnapshot::default()).is_terminal());
        assert!(Delivery::Error(ErrorInfo::default()).is_terminal());
    }
}
