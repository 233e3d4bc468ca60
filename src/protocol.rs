use serde::{Deserialize, Serialize};

/// Shown when an error payload carries no usable message.
pub const FALLBACK_ERROR: &str = "Stream error";

/// Payload marking the end of a pull-based event stream.
pub const SSE_DONE: &str = "[DONE]";

// -- Conversation history ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One finalized history entry, as owned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Message { role, text: text.into() }
    }
}

/// The backend's authoritative history, delivered on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub messages: Vec<Message>,
}

// -- Incremental updates ----------------------------------------------------

/// One incremental unit of streamed content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Sequence index assigned by the backend. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Chunk {
    pub fn text(text: impl Into<String>) -> Self {
        Chunk { text: Some(text.into()), ..Default::default() }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        Chunk { thinking: Some(thinking.into()), ..Default::default() }
    }
}

/// A batch of chunks delivered together by one push or pull event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBatch {
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- Errors -----------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorInfo {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorInfo { error: Some(error.into()) }
    }

    /// The text to display: the backend message if non-empty, else the fallback.
    pub fn display_text(&self) -> &str {
        match self.error.as_deref() {
            Some(msg) if !msg.is_empty() => msg,
            _ => FALLBACK_ERROR,
        }
    }
}

// -- Submission -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

/// Aggregated body returned by the request/response endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FetchReply {
    #[serde(default)]
    pub thinking: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub assistant_text: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

// -- Push channel events ----------------------------------------------------

/// Events sent by the client over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    StartStream(PromptRequest),
}

/// Events the backend pushes for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    StreamChunk(ChunkBatch),
    StreamComplete(HistorySnapshot),
    StreamError(ErrorInfo),
}

// -- Pull stream payloads ---------------------------------------------------

/// One decoded `data:` payload of the pull event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Done,
    Batch(ChunkBatch),
}

impl SseData {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        let payload = payload.trim();
        if payload == SSE_DONE {
            return Ok(SseData::Done);
        }
        serde_json::from_str(payload).map(SseData::Batch)
    }
}
