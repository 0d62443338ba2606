//! Speech-to-text client for OpenAI-compatible Whisper endpoints (Groq by
//! default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use sogo_core::wav::AudioFormat;

use crate::config::SttConfig;
use crate::error::{Error, Result};

/// Turns a recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

#[derive(Clone)]
pub struct WhisperClient {
    client: Client,
    config: SttConfig,
}

impl WhisperClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SttConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        if audio.is_empty() {
            return Err(Error::bad_request("empty audio upload"));
        }

        let format = AudioFormat::sniff(&audio);
        debug!("transcribing {} bytes as {format:?}", audio.len());

        let part = Part::bytes(audio)
            .file_name(format.file_name())
            .mime_str(format.mime())
            .map_err(|e| Error::transcription(format!("mime error: {e}")))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "json")
            .text("temperature", "0");

        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(url).multipart(form);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::transcription(format!("{status}: {body}")));
        }

        let body = resp.text().await?;
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| Error::transcription(format!("invalid JSON: {e}; raw={body}")))?;

        let raw_text = value.get("text").and_then(|v| v.as_str()).unwrap_or("");
        Ok(clean_transcript(raw_text))
    }
}

/// Drop Whisper's silence marker and surrounding whitespace.
fn clean_transcript(raw: &str) -> String {
    raw.replace("[BLANK_AUDIO]", "").trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::extract::Multipart;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use sogo_core::wav::write_wav;

    use crate::test_support::serve;

    /// Returns a fixed transcript and keeps the uploads it saw.
    pub struct FixedTranscriber {
        pub text: std::result::Result<String, String>,
        pub uploads: Mutex<Vec<Vec<u8>>>,
    }

    impl FixedTranscriber {
        pub fn new(text: &str) -> Self {
            Self {
                text: Ok(text.to_string()),
                uploads: Mutex::default(),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                text: Err(message.to_string()),
                uploads: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
            self.uploads.lock().unwrap().push(audio);
            match &self.text {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(Error::transcription(message.clone())),
            }
        }
    }

    #[test]
    fn test_clean_transcript() {
        assert_eq!(clean_transcript(" [BLANK_AUDIO] "), "");
        assert_eq!(clean_transcript(" My name is Asha. "), "My name is Asha.");
    }

    #[tokio::test]
    async fn test_transcribe_sends_whisper_form() {
        let app = Router::new().route(
            "/audio/transcriptions",
            post(|headers: HeaderMap, mut form: Multipart| async move {
                assert_eq!(headers["authorization"], "Bearer groq-key");
                let mut fields = Vec::new();
                while let Some(field) = form.next_field().await.unwrap() {
                    let name = field.name().unwrap_or_default().to_string();
                    let file_name = field.file_name().map(str::to_string);
                    let value = if file_name.is_some() {
                        file_name.unwrap_or_default()
                    } else {
                        field.text().await.unwrap()
                    };
                    fields.push((name, value));
                }
                let has = |k: &str, v: &str| fields.iter().any(|(n, x)| n == k && x == v);
                assert!(has("file", "recording.wav"));
                assert!(has("model", "whisper-large-v3"));
                assert!(has("language", "en"));
                assert!(has("response_format", "json"));
                assert!(has("temperature", "0"));
                Json(json!({"text": " I like cricket [BLANK_AUDIO]"}))
            }),
        );
        let base = serve(app).await;

        let client = WhisperClient::new(SttConfig {
            base_url: base,
            api_key: "groq-key".into(),
            ..SttConfig::default()
        })
        .unwrap();

        let wav = write_wav(&[0i16; 160], 16_000);
        let text = client.transcribe(wav).await.unwrap();
        assert_eq!(text, "I like cricket");
    }

    #[tokio::test]
    async fn test_transcribe_reports_upstream_failure() {
        let app = Router::new().route(
            "/audio/transcriptions",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = serve(app).await;
        let client = WhisperClient::new(SttConfig {
            base_url: base,
            ..SttConfig::default()
        })
        .unwrap();
        let err = client.transcribe(vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, Error::Transcription(ref m) if m.contains("bad key")));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let client = WhisperClient::new(SttConfig::default()).unwrap();
        assert!(matches!(
            client.transcribe(Vec::new()).await,
            Err(Error::BadRequest(_))
        ));
    }
}
