//! Local transport that simulates a backend on timers.
//!
//! Streams the configured thinking word by word, then the reply, and keeps
//! its own conversation history seeded with a system message.

use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::config::MockSettings;
use crate::error::ChatError;
use crate::protocol::{Chunk, ErrorInfo, HistorySnapshot, Message, Role};
use crate::transport::EventSink;

pub struct MockTransport {
    settings: MockSettings,
    history: Mutex<Vec<Message>>,
}

impl MockTransport {
    pub fn new(settings: MockSettings) -> Self {
        let history = vec![Message::new(Role::System, settings.system_prompt.clone())];
        MockTransport { settings, history: Mutex::new(history) }
    }

    /// Copy of the simulated backend's history.
    pub fn history(&self) -> Vec<Message> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn deliver(&self, prompt: &str, sink: &mut EventSink) -> Result<(), ChatError> {
        self.record(Message::new(Role::User, prompt));

        let thinking = self.settings.thinking.replace("{prompt}", prompt);
        let mut index = 0u64;
        for word in words(&thinking) {
            self.pause().await;
            sink.chunks(vec![Chunk {
                thinking: Some(word.to_string()),
                index: Some(index),
                role: Some(Role::Assistant.to_string()),
                ..Default::default()
            }]);
            index += 1;
        }

        if let Some(failure) = &self.settings.fail_with {
            self.pause().await;
            sink.error(ErrorInfo::new(failure.clone()));
            return Ok(());
        }

        let reply = self.settings.reply.replace("{prompt}", prompt);
        for word in words(&reply) {
            self.pause().await;
            sink.chunks(vec![Chunk {
                text: Some(word.to_string()),
                index: Some(index),
                role: Some(Role::Assistant.to_string()),
                ..Default::default()
            }]);
            index += 1;
        }

        let assistant = reply.trim();
        if !assistant.is_empty() {
            self.record(Message::new(Role::Assistant, assistant));
        }
        let messages = self.history();
        debug!(exchange = %sink.exchange(), chunks = index, "mock reply finished");
        sink.complete(HistorySnapshot { messages });
        Ok(())
    }

    fn record(&self, message: Message) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).push(message);
    }

    async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.settings.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.settings.jitter_ms)
        };
        Duration::from_millis(self.settings.delay_ms + jitter)
    }
}

/// Word-sized pieces that keep their trailing space, so they concatenate back
/// to the original text.
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(' ')
}
