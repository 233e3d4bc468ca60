//! Client configuration: TOML file with command-line overrides.
//!
//! ```toml
//! server_url = "http://127.0.0.1:5000"
//! transport = "push"
//! show_thinking = true
//!
//! [mock]
//! delay_ms = 25
//! reply = "You said: {prompt}"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ChatError;
use crate::transport::{endpoint, TransportKind};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the conversational backend.
    pub server_url: String,
    pub transport: TransportKind,
    /// Path of the push channel endpoint, joined onto `server_url`.
    pub push_path: String,
    /// Stream the thinking region live while a reply is in flight.
    pub show_thinking: bool,
    /// Upper bound for request/response calls. Streams are only bounded by
    /// the connect timeout.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub mock: MockSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
            transport: TransportKind::Sse,
            push_path: "/ws".to_string(),
            show_thinking: true,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            mock: MockSettings::default(),
        }
    }
}

/// Behaviour of the local mock transport. `{prompt}` in `thinking` or `reply`
/// is replaced by the submitted prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    pub delay_ms: u64,
    pub jitter_ms: u64,
    pub thinking: String,
    pub reply: String,
    /// When set, the mock fails with this message after streaming its
    /// thinking instead of replying.
    pub fail_with: Option<String>,
    pub system_prompt: String,
}

impl Default for MockSettings {
    fn default() -> Self {
        MockSettings {
            delay_ms: 40,
            jitter_ms: 20,
            thinking: "These are some inner thoughts that will stream in...".to_string(),
            reply: "This is the visible response text.".to_string(),
            fail_with: None,
            system_prompt: "You are Kimi.".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChatError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        let url = self.server_url.as_str();
        let Some(rest) = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://")) else {
            return Err(ChatError::InvalidUrl(format!(
                "'{}' must start with http:// or https://",
                url
            )));
        };
        if rest.split('/').next().unwrap_or("").is_empty() {
            return Err(ChatError::InvalidUrl(format!("'{}' has no host", url)));
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint(&self.server_url, path)
    }

    /// WebSocket URL of the push channel (`http` → `ws`, `https` → `wss`).
    pub fn push_url(&self) -> Result<String, ChatError> {
        let http = self.endpoint(&self.push_path);
        if let Some(rest) = http.strip_prefix("https://") {
            Ok(format!("wss://{}", rest))
        } else if let Some(rest) = http.strip_prefix("http://") {
            Ok(format!("ws://{}", rest))
        } else {
            Err(ChatError::InvalidUrl(self.server_url.clone()))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.server_url, DEFAULT_SERVER_URL);
        assert_eq!(c.transport, TransportKind::Sse);
        assert!(c.show_thinking);
        assert_eq!(c.mock.reply, "This is the visible response text.");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml_str("").expect("parse"), Config::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let c = Config::from_toml_str(
            r#"
            transport = "push"
            server_url = "https://chat.example.com/"

            [mock]
            delay_ms = 0
            "#,
        )
        .expect("parse");
        assert_eq!(c.transport, TransportKind::Push);
        assert_eq!(c.mock.delay_ms, 0);
        assert_eq!(c.mock.jitter_ms, 20);
        assert_eq!(c.push_path, "/ws");
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let err = Config::from_toml_str(r#"transport = "carrier-pigeon""#).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let err = Config::from_toml_str(r#"server_url = "ftp://example.com""#).unwrap_err();
        assert!(matches!(err, ChatError::InvalidUrl(_)));
    }

    #[test]
    fn test_hostless_url_rejected() {
        let c = Config { server_url: "http://".to_string(), ..Default::default() };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_push_url_schemes() {
        let mut c = Config { server_url: "http://127.0.0.1:5000".to_string(), ..Default::default() };
        assert_eq!(c.push_url().expect("url"), "ws://127.0.0.1:5000/ws");
        c.server_url = "https://chat.example.com/".to_string();
        c.push_path = "/socket".to_string();
        assert_eq!(c.push_url().expect("url"), "wss://chat.example.com/socket");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "transport = \"mock\"\nshow_thinking = false").expect("write");
        let c = Config::load(file.path()).expect("load");
        assert_eq!(c.transport, TransportKind::Mock);
        assert!(!c.show_thinking);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ChatError::Io(_)));
    }
}
