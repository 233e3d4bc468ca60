//! Interactive session: routes input lines and transport events into the
//! renderer.
//!
//! The session owns the only receiver of transport events. Every event is
//! tagged with the exchange it belongs to; events for an exchange that is no
//! longer active are dropped before they reach the renderer.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::exchange::ExchangeStatus;
use crate::renderer::{StreamRenderer, Submission, Surface};
use crate::transport::{Delivery, Transport, TransportEvent};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Prompt(String),
    /// Flip the thinking of entry `n`, or of the latest entry that has one.
    Thinking(Option<usize>),
    History,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Command::Prompt(line.to_string());
        }
        // `//` sends the rest, with one leading slash, as a prompt.
        if let Some(rest) = trimmed.strip_prefix("//") {
            return Command::Prompt(format!("/{}", rest));
        }
        let mut parts = trimmed.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        match name {
            "/thinking" => match arg.map(str::parse::<usize>) {
                None => Command::Thinking(None),
                Some(Ok(n)) => Command::Thinking(Some(n)),
                Some(Err(_)) => Command::Unknown(trimmed.to_string()),
            },
            "/history" => Command::History,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

pub struct Session<S: Surface> {
    renderer: StreamRenderer<S>,
    transport: Arc<Transport>,
    tx: mpsc::UnboundedSender<TransportEvent>,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    inflight: Option<JoinHandle<()>>,
}

impl<S: Surface> Session<S> {
    pub fn new(surface: S, transport: Transport) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Session {
            renderer: StreamRenderer::new(surface),
            transport: Arc::new(transport),
            tx,
            rx,
            inflight: None,
        }
    }

    pub fn renderer(&self) -> &StreamRenderer<S> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut StreamRenderer<S> {
        &mut self.renderer
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Start an exchange for `line` and hand it to the transport.
    pub fn submit(&mut self, line: &str) -> Result<Submission, ChatError> {
        let submission = self.renderer.submit(line)?;
        if let Submission::Started { id, prompt } = &submission {
            self.inflight = Some(Transport::spawn(
                &self.transport,
                *id,
                prompt.clone(),
                self.tx.clone(),
            ));
        }
        Ok(submission)
    }

    /// Apply one transport event. Returns the final status when the event
    /// ended the active exchange.
    pub fn dispatch(&mut self, event: TransportEvent) -> Option<ExchangeStatus> {
        if self.renderer.active_id() != Some(event.exchange) {
            debug!(exchange = %event.exchange, "dropping event for inactive exchange");
            return None;
        }

        let finished = match event.delivery {
            Delivery::Chunks(chunks) => {
                if let Err(e) = self.renderer.on_chunks(&chunks) {
                    warn!(exchange = %event.exchange, error = %e, "chunk rejected");
                }
                return None;
            }
            Delivery::Complete(snapshot) => self.renderer.on_complete(snapshot),
            Delivery::Error(info) => self.renderer.on_error(&info),
        };

        self.inflight = None;
        match finished {
            Ok(exchange) => Some(exchange.status()),
            Err(e) => {
                warn!(exchange = %event.exchange, error = %e, "terminal event rejected");
                None
            }
        }
    }

    /// Wait for the active exchange, if any, to reach its terminal state.
    pub async fn wait_idle(&mut self) -> ExchangeStatus {
        if self.renderer.active_id().is_none() {
            return ExchangeStatus::Idle;
        }
        while let Some(event) = self.rx.recv().await {
            if let Some(status) = self.dispatch(event) {
                return status;
            }
        }
        ExchangeStatus::Idle
    }

    /// Handle one line of input. Returns `false` when the session should end.
    pub fn handle_line(&mut self, line: &str) -> bool {
        match Command::parse(line) {
            Command::Prompt(text) => {
                if let Err(e) = self.submit(&text) {
                    debug!(error = %e, "submission rejected");
                }
            }
            Command::Thinking(index) => {
                let target = index.or_else(|| self.renderer.latest_with_thinking());
                if target.and_then(|i| self.renderer.toggle_thinking(i)).is_none() {
                    self.renderer.surface_mut().show_notice("No thinking to toggle.");
                }
            }
            Command::History => self.renderer.redraw_history(),
            Command::Quit => return false,
            Command::Unknown(cmd) => {
                self.renderer
                    .surface_mut()
                    .show_notice(&format!("Unknown command: {}", cmd));
            }
        }
        true
    }

    /// Read lines from `input` until `/quit` or end of input. At end of
    /// input the active exchange, if any, is allowed to finish first.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<(), ChatError> {
        let mut lines = input.split(b'\n');
        let mut input_open = true;
        self.renderer.surface_mut().awaiting_input();

        loop {
            if !input_open && self.renderer.active_id().is_none() {
                break;
            }
            tokio::select! {
                segment = lines.next_segment(), if input_open => {
                    match segment? {
                        Some(raw) => {
                            match decode_line(raw) {
                                Some(line) => {
                                    if !self.handle_line(&line) {
                                        break;
                                    }
                                }
                                None => {
                                    warn!("input line is not valid UTF-8");
                                    self.renderer
                                        .surface_mut()
                                        .show_notice("Input line is not valid UTF-8; ignored.");
                                }
                            }
                            if self.renderer.status() == ExchangeStatus::Idle {
                                self.renderer.surface_mut().awaiting_input();
                            }
                        }
                        None => input_open = false,
                    }
                }
                Some(event) = self.rx.recv() => {
                    if self.dispatch(event).is_some() && input_open {
                        self.renderer.surface_mut().awaiting_input();
                    }
                }
            }
        }

        self.abort_inflight();
        Ok(())
    }

    /// Stop the in-flight transport and release the exchange it was feeding.
    fn abort_inflight(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        if let Some(exchange) = self.renderer.abandon() {
            debug!(exchange = %exchange.id(), "exchange abandoned");
        }
    }
}

/// One input line without its line ending, or `None` if it is not UTF-8.
fn decode_line(mut raw: Vec<u8>) -> Option<String> {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    String::from_utf8(raw).ok()
}

impl<S: Surface> Drop for Session<S> {
    fn drop(&mut self) {
        self.abort_inflight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockSettings;
    use crate::exchange::ExchangeId;
    use crate::protocol::{Chunk, Role};
    use crate::renderer::ThinkingToggle;
    use crate::surface::PageSurface;
    use crate::transport::MockTransport;
    use rstest::rstest;

    fn session(settings: MockSettings) -> Session<PageSurface> {
        Session::new(
            PageSurface::default(),
            Transport::Mock(MockTransport::new(settings)),
        )
    }

    fn instant() -> MockSettings {
        MockSettings { delay_ms: 0, jitter_ms: 0, ..Default::default() }
    }

    #[rstest]
    #[case("hello", Command::Prompt("hello".to_string()))]
    #[case("  /thinking ", Command::Thinking(None))]
    #[case("/thinking 3", Command::Thinking(Some(3)))]
    #[case("/thinking x", Command::Unknown("/thinking x".to_string()))]
    #[case("/history", Command::History)]
    #[case("/quit", Command::Quit)]
    #[case("/exit", Command::Quit)]
    #[case("/nope", Command::Unknown("/nope".to_string()))]
    #[case("//usr/bin vs /bin?", Command::Prompt("/usr/bin vs /bin?".to_string()))]
    fn test_command_parse(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line), expected);
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let mut s = session(instant());
        s.submit("hi").expect("submit");
        assert_eq!(s.wait_idle().await, ExchangeStatus::Complete);
        let page = s.renderer().surface();
        assert_eq!(page.response, "This is the visible response text.");
        assert_eq!(page.history.len(), 3);
        assert_eq!(page.history[0].message.role, Role::System);
        assert_eq!(
            page.history[2].thinking.as_deref(),
            Some("These are some inner thoughts that will stream in...")
        );
    }

    #[tokio::test]
    async fn test_wait_idle_without_exchange() {
        let mut s = session(instant());
        assert_eq!(s.wait_idle().await, ExchangeStatus::Idle);
    }

    #[tokio::test]
    async fn test_mock_failure_is_errored() {
        let mut s = session(MockSettings {
            fail_with: Some("overloaded".to_string()),
            ..instant()
        });
        s.submit("hi").expect("submit");
        assert_eq!(s.wait_idle().await, ExchangeStatus::Errored);
        assert_eq!(s.renderer().surface().error.as_deref(), Some("overloaded"));
        assert!(s.renderer().surface().history.is_empty());
    }

    #[tokio::test]
    async fn test_stale_event_dropped() {
        let mut s = session(instant());
        s.submit("hi").expect("submit");
        let stale = TransportEvent {
            exchange: ExchangeId::new(),
            delivery: Delivery::Chunks(vec![Chunk::text("ghost")]),
        };
        assert_eq!(s.dispatch(stale), None);
        assert!(s.renderer().surface().response.is_empty());
        s.wait_idle().await;
        assert!(!s.renderer().surface().response.contains("ghost"));
    }

    #[tokio::test]
    async fn test_thinking_command_toggles_latest() {
        let mut s = session(instant());
        s.submit("hi").expect("submit");
        s.wait_idle().await;
        assert!(s.handle_line("/thinking"));
        assert_eq!(s.renderer().history()[2].toggle, ThinkingToggle::Shown);
        assert!(s.handle_line("/thinking 2"));
        assert_eq!(s.renderer().history()[2].toggle, ThinkingToggle::Hidden);
    }

    #[tokio::test]
    async fn test_thinking_command_without_thinking_notifies() {
        let mut s = session(instant());
        assert!(s.handle_line("/thinking"));
        assert_eq!(
            s.renderer().surface().notice.as_deref(),
            Some("No thinking to toggle.")
        );
    }

    #[tokio::test]
    async fn test_quit_ends_run() {
        let mut s = session(instant());
        s.run(&b"/quit\nnever sent\n"[..]).await.expect("run");
        assert!(s.renderer().history().is_empty());
        assert_eq!(s.renderer().status(), ExchangeStatus::Idle);
    }

    #[tokio::test]
    async fn test_run_drains_exchange_at_end_of_input() {
        let mut s = session(instant());
        s.run(&b"hello\n"[..]).await.expect("run");
        assert_eq!(s.renderer().status(), ExchangeStatus::Idle);
        assert_eq!(s.renderer().history().len(), 3);
        assert_eq!(s.renderer().history()[1].message.text, "hello");
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"hi\r".to_vec()), Some("hi".to_string()));
        assert_eq!(decode_line(b"hi".to_vec()), Some("hi".to_string()));
        assert_eq!(decode_line(b"\xff\xfe".to_vec()), None);
    }

    #[tokio::test]
    async fn test_run_skips_invalid_utf8_line() {
        let mut s = session(instant());
        s.run(&b"\xff\xfe\nhello after\n"[..]).await.expect("run");
        let history = s.renderer().history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].message.text, "hello after");
    }

    #[tokio::test]
    async fn test_slash_escape_sends_prompt() {
        let mut s = session(instant());
        s.run(&b"//usr/bin vs /bin?\n"[..]).await.expect("run");
        assert_eq!(s.renderer().history()[1].message.text, "/usr/bin vs /bin?");
    }

    #[tokio::test]
    async fn test_quit_mid_stream_releases_exchange() {
        let mut s = session(MockSettings { delay_ms: 30, jitter_ms: 0, ..Default::default() });
        s.run(&b"one\n/quit\n"[..]).await.expect("run");
        assert_eq!(s.renderer().status(), ExchangeStatus::Idle);
        assert!(s.renderer().history().is_empty());

        s.run(&b"two\n"[..]).await.expect("run");
        let history = s.renderer().history();
        assert_eq!(history.last().map(|e| e.message.role), Some(Role::Assistant));
        assert!(history.iter().any(|e| e.message.text == "two"));
    }

    #[tokio::test]
    async fn test_run_rejects_prompt_while_streaming() {
        let mut s = session(MockSettings { delay_ms: 30, jitter_ms: 0, ..Default::default() });
        s.run(&b"one\ntwo\n"[..]).await.expect("run");
        let history = s.renderer().history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].message.text, "one");
        assert!(history.iter().all(|e| e.message.text != "two"));
    }
}
