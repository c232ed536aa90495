//! OpenAI text-to-speech adapter for [`SpeechPort`]

use async_trait::async_trait;
use serde_json::json;

use crate::ports::{call_with_retries, ProviderError, RetryPolicy, SpeechPort};
use crate::providers::{http_error, transport_error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const TTS_MODEL: &str = "tts-1";

pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    voice: String,
    retry: RetryPolicy,
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            voice: "alloy".to_string(),
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One of: alloy, echo, fable, onyx, nova, shimmer.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    async fn send(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let body = json!({
            "model": TTS_MODEL,
            "voice": self.voice,
            "input": text,
            "speed": 1.0,
        });

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(http_error(status, detail));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechPort for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        call_with_retries(&self.retry, || self.send(text)).await
    }
}
