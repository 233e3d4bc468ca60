//! Request/response transport: one `POST /reply` returning the aggregated
//! thinking, text and history.

use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::ChatError;
use crate::protocol::{Chunk, FetchReply, HistorySnapshot, PromptRequest};
use crate::transport::{backend_error, endpoint, EventSink};

pub struct FetchTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FetchTransport {
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(FetchTransport {
            client,
            base_url: config.server_url.clone(),
            timeout: config.request_timeout(),
        })
    }

    pub async fn deliver(&self, prompt: &str, sink: &mut EventSink) -> Result<(), ChatError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "/reply"))
            .timeout(self.timeout)
            .json(&PromptRequest { prompt: prompt.to_string() })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let body = response.text().await?;
        let reply: FetchReply = serde_json::from_str(&body)?;
        sink.chunks(reply_chunks(&reply));
        sink.complete(HistorySnapshot { messages: reply.messages });
        Ok(())
    }
}

/// The aggregated reply as one batch: thinking first, then text.
fn reply_chunks(reply: &FetchReply) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if !reply.thinking.is_empty() {
        chunks.push(Chunk::thinking(reply.thinking.clone()));
    }
    if !reply.text.is_empty() {
        chunks.push(Chunk::text(reply.text.clone()));
    }
    chunks
}
