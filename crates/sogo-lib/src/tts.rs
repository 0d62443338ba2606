//! Text-to-speech client: tutor reply → cleaned chunks → Kokoro-style
//! `/v1/audio/speech` → one WAV.
//!
//! ```text
//! synthesize("reply") → clean_text_for_speech → chunk_for_speech
//!     → POST chunk 0 ┐
//!     → POST chunk 1 ┘ (FETCHER_COUNT in flight, results kept in order)
//!     → fix_wav_sizes each → concat_wav
//! ```
//!
//! Speech servers that stream WAV write sentinel sizes into the header; each
//! part is patched before the parts are joined.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use tracing::{debug, error};

use sogo_core::text_prep::{chunk_for_speech, clean_text_for_speech, is_speakable};
use sogo_core::wav::{concat_wav, fix_wav_sizes};

use crate::config::TtsConfig;
use crate::error::{Error, Result};

/// Requests in flight at once. Order of the output is preserved.
const FETCHER_COUNT: usize = 2;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns text into playable WAV bytes.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct SpeechClient {
    client: Client,
    config: TtsConfig,
}

impl SpeechClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TtsConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    async fn fetch_chunk(&self, index: usize, text: String, voice: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/v1/audio/speech",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "input": text,
            "voice": voice,
            "model": "kokoro",
            "response_format": "wav",
            "speed": self.config.speed,
        });

        debug!("tts[{index}]: POST {} chars", text.len());

        let resp = self.client.post(&url).json(&body).send().await.map_err(|e| {
            error!("tts[{index}]: request failed: {e}");
            Error::speech(format!("request failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("tts[{index}]: speech server error {status}: {text}");
            return Err(Error::speech(format!("{status}: {text}")));
        }

        let bytes = resp.bytes().await?;
        Ok(fix_wav_sizes(bytes.to_vec()))
    }
}

#[async_trait]
impl SpeechSynth for SpeechClient {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        let cleaned = clean_text_for_speech(text);
        if !is_speakable(&cleaned) {
            return Err(Error::NothingToSay);
        }

        let voice = voice.unwrap_or(&self.config.voice);
        let chunks = chunk_for_speech(&cleaned, self.config.max_chunk_len);
        debug!("tts: {} chunk(s), voice {voice}", chunks.len());

        let parts: Vec<Vec<u8>> = stream::iter(chunks.into_iter().enumerate())
            .map(|(i, chunk)| self.fetch_chunk(i, chunk, voice))
            .buffered(FETCHER_COUNT)
            .try_collect()
            .await?;

        if parts.len() == 1 {
            return Ok(parts.into_iter().next().unwrap_or_default());
        }
        concat_wav(&parts).map_err(|e| Error::speech(format!("cannot join audio: {e}")))
    }
}
