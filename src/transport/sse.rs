//! Pull transport: Server-Sent Events over `GET /stream`, then a read-only
//! `GET /messages` for the history once the stream signals completion.

use reqwest::Client;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::protocol::{ErrorInfo, HistorySnapshot, SseData};
use crate::transport::{backend_error, endpoint, EventSink};

/// Splits a byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so a read boundary in
/// the middle of a multi-byte character never corrupts the payload.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes; returns the payloads of every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(line_end) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=line_end).collect();
            if let Some(payload) = data_payload(&line[..line.len() - 1]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Payload of a trailing line the server did not terminate.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix("data:")?;
    Some(payload.strip_prefix(' ').unwrap_or(payload).to_string())
}

/// What to do after one payload.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Terminal marker seen; fetch the history next.
    Done,
    /// A terminal event was already sent.
    Stop,
}

pub struct SseTransport {
    client: Client,
    base_url: String,
}

impl SseTransport {
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(SseTransport { client, base_url: config.server_url.clone() })
    }

    pub async fn deliver(&self, prompt: &str, sink: &mut EventSink) -> Result<(), ChatError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "/stream"))
            .query(&[("prompt", prompt)])
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for payload in decoder.push(&chunk) {
                match handle_payload(&payload, sink) {
                    Flow::Continue => {}
                    Flow::Done => return self.fetch_history(sink).await,
                    Flow::Stop => return Ok(()),
                }
            }
        }

        if let Some(payload) = decoder.finish() {
            match handle_payload(&payload, sink) {
                Flow::Done => return self.fetch_history(sink).await,
                Flow::Continue | Flow::Stop => {}
            }
        }

        // Closed without a terminal marker; the caller reports it.
        Ok(())
    }

    async fn fetch_history(&self, sink: &mut EventSink) -> Result<(), ChatError> {
        let response = self.client.get(endpoint(&self.base_url, "/messages")).send().await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }
        let body = response.text().await?;
        let snapshot: HistorySnapshot = serde_json::from_str(&body)?;
        debug!(messages = snapshot.messages.len(), "history fetched");
        sink.complete(snapshot);
        Ok(())
    }
}

fn handle_payload(payload: &str, sink: &mut EventSink) -> Flow {
    match SseData::parse(payload) {
        Ok(SseData::Done) => Flow::Done,
        Ok(SseData::Batch(batch)) => {
            if let Some(error) = batch.error {
                sink.error(ErrorInfo { error: Some(error) });
                return Flow::Stop;
            }
            sink.chunks(batch.chunks);
            if batch.is_final {
                Flow::Done
            } else {
                Flow::Continue
            }
        }
        Err(e) => {
            warn!(exchange = %sink.exchange(), error = %e, "skipping malformed stream event");
            Flow::Continue
        }
    }
}
