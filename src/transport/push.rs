//! Push transport: a WebSocket channel carrying tagged JSON events.
//!
//! The client sends one `start_stream` event; the backend answers with any
//! number of `stream_chunk` events and one `stream_complete` or `stream_error`.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::protocol::{ClientEvent, ErrorInfo, PromptRequest, ServerEvent};
use crate::transport::EventSink;

pub struct PushTransport {
    url: String,
}

impl PushTransport {
    pub fn new(url: String) -> Self {
        PushTransport { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn deliver(&self, prompt: &str, sink: &mut EventSink) -> Result<(), ChatError> {
        let (mut ws, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        debug!(exchange = %sink.exchange(), url = %self.url, "push channel open");

        let start = ClientEvent::StartStream(PromptRequest { prompt: prompt.to_string() });
        ws.send(WsMessage::Text(serde_json::to_string(&start)?)).await?;

        while let Some(frame) = ws.next().await {
            let text = match frame? {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => break,
                _ => continue,
            };
            match serde_json::from_str::<ServerEvent>(&text) {
                Ok(ServerEvent::StreamChunk(batch)) => {
                    if let Some(error) = batch.error {
                        sink.error(ErrorInfo { error: Some(error) });
                        break;
                    }
                    sink.chunks(batch.chunks);
                }
                Ok(ServerEvent::StreamComplete(snapshot)) => {
                    sink.complete(snapshot);
                    break;
                }
                Ok(ServerEvent::StreamError(info)) => {
                    sink.error(info);
                    break;
                }
                Err(e) => {
                    warn!(exchange = %sink.exchange(), error = %e, "skipping malformed push event");
                }
            }
        }

        // Best effort; the exchange outcome is already decided.
        let _ = ws.close(None).await;
        Ok(())
    }
}
