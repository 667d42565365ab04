use serde::{Deserialize, Serialize};

pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_base_url: String,

    // BCP-47 tag handed to the speech recognizer.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    // Applies to buffered commands only; chat streams are bounded by the connect timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_language() -> String {
    "fr-FR".into()
}

fn default_silence_timeout_ms() -> u64 {
    DEFAULT_SILENCE_TIMEOUT_MS
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            language: default_language(),
            silence_timeout_ms: default_silence_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
