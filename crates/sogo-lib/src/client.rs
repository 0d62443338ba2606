//! HTTP client for a running tutoring server. Used by the CLI and the
//! terminal voice session.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use sogo_core::types::{
    ChatMessage, ChatRequest, ChatResponse, CodeRequest, CodeResponse, CurriculumResponse,
    ErrorBody, FinderRequest, FinderResponse, HealthResponse, LabsResponse, ProgressRequest,
    ProgressResponse, QuizRequest, QuizResponse, SpeechRequest, StartModuleRequest,
    StartModuleResponse, VoiceChatResponse,
};
use sogo_core::wav::AudioFormat;

use crate::error::{Error, Result};

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.client.get(self.url(path)).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        debug!("POST {path}");
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/").await
    }

    /// Coding tracks and their ordered modules.
    pub async fn curriculum(&self) -> Result<CurriculumResponse> {
        self.get("/curriculum").await
    }

    pub async fn labs(&self) -> Result<LabsResponse> {
        self.get("/labs").await
    }

    pub async fn progress(&self, user_id: &str) -> Result<ProgressResponse> {
        self.post(
            "/progress",
            &ProgressRequest {
                user_id: user_id.to_string(),
            },
        )
        .await
    }

    pub async fn start_module(&self, req: &StartModuleRequest) -> Result<StartModuleResponse> {
        self.post("/start_module", req).await
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.post("/chat", req).await
    }

    /// Upload a recording with the conversation so far.
    pub async fn voice_chat(
        &self,
        audio: Vec<u8>,
        user_id: &str,
        history: &[ChatMessage],
        module_name: &str,
        goal: &str,
    ) -> Result<VoiceChatResponse> {
        let format = AudioFormat::sniff(&audio);
        let part = Part::bytes(audio)
            .file_name(format.file_name())
            .mime_str(format.mime())?;
        let form = Form::new()
            .part("audio", part)
            .text("user_id", user_id.to_string())
            .text("history", serde_json::to_string(history)?)
            .text("module_name", module_name.to_string())
            .text("goal", goal.to_string());

        let resp = self
            .client
            .post(self.url("/voice_chat"))
            .multipart(form)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn run_code(&self, code: &str, user_id: &str) -> Result<CodeResponse> {
        self.post(
            "/run_code",
            &CodeRequest {
                code: code.to_string(),
                user_id: user_id.to_string(),
            },
        )
        .await
    }

    /// Synthesized WAV for `text`.
    pub async fn speech(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        let body = SpeechRequest {
            text: text.to_string(),
            voice: voice.map(str::to_string),
        };
        let resp = self.client.post(self.url("/speech")).json(&body).send().await?;
        Ok(check(resp).await?.bytes().await?.to_vec())
    }

    pub async fn lab_finder(&self, value: &str) -> Result<FinderResponse> {
        self.post(
            "/lab_finder",
            &FinderRequest {
                value: value.to_string(),
            },
        )
        .await
    }

    pub async fn career_quiz(&self, choice: &str) -> Result<QuizResponse> {
        self.post(
            "/career_quiz",
            &QuizRequest {
                choice: choice.to_string(),
            },
        )
        .await
    }
}

/// Turn an error status into [`Error::Api`], keeping the server's detail.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.detail)
        .unwrap_or(body);
    Err(Error::Api {
        status: status.as_u16(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::server::router;
    use crate::service::tests::harness;
    use crate::stt::tests::FixedTranscriber;
    use crate::test_support::serve;
    use crate::tutor::tests::ScriptedModel;

    async fn client(model: ScriptedModel, transcriber: FixedTranscriber) -> ApiClient {
        let h = harness(model, transcriber);
        ApiClient::new(serve(router(h.service)).await + "/")
    }

    #[tokio::test]
    async fn test_health_and_catalog() {
        let api = client(ScriptedModel::default(), FixedTranscriber::new("")).await;
        assert!(!api.base_url().ends_with('/'));
        assert_eq!(api.health().await.unwrap().service, "SOGO Backend");
        let tracks = api.curriculum().await.unwrap();
        assert_eq!(tracks["Food Blog"].len(), 6);
        let labs = api.labs().await.unwrap();
        assert_eq!(labs.open_lab, "Python Logic Lab");
        assert_eq!(labs.programming.len(), 4);
    }

    #[tokio::test]
    async fn test_lesson_flow() {
        let api = client(
            ScriptedModel::new(vec![
                Ok("Welcome to The Menu! What is a string?".into()),
                Ok("Yes, text in quotes! [MODULE_COMPLETE]".into()),
            ]),
            FixedTranscriber::new(""),
        )
        .await;

        let start = api
            .start_module(&StartModuleRequest {
                user_id: "user_7".into(),
                goal: "Food Blog".into(),
                module_name: None,
            })
            .await
            .unwrap();
        assert_eq!(start.module, "The Menu (Strings)");

        let reply = api
            .chat(&ChatRequest {
                user_id: "user_7".into(),
                message: "text in quotes".into(),
                history: vec![ChatMessage::assistant(start.intro_message)],
                module_name: start.module,
                goal: "Food Blog".into(),
            })
            .await
            .unwrap();
        assert!(reply.module_complete);
        assert_eq!(reply.next_module, "The Foodies List (Lists)");

        let progress = api.progress("user_7").await.unwrap();
        assert_eq!(progress.progress.unwrap().module, "The Foodies List (Lists)");
        assert_eq!(progress.xp.frontend, 20);
    }

    #[tokio::test]
    async fn test_error_detail_is_kept() {
        let api = client(ScriptedModel::default(), FixedTranscriber::new("")).await;
        let err = api
            .start_module(&StartModuleRequest {
                user_id: "user_7".into(),
                goal: "Pottery".into(),
                module_name: None,
            })
            .await
            .unwrap_err();
        match err {
            Error::Api { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Invalid Goal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_voice_chat_upload() {
        let api = client(
            ScriptedModel::replying("Lovely! What colour is a mango?"),
            FixedTranscriber::new("I like mangoes"),
        )
        .await;
        let wav = sogo_core::wav::write_wav(&[0; 320], 16_000);
        let resp = api
            .voice_chat(wav, "user_7", &[], "Level 0: The Explorer", "English Adventure")
            .await
            .unwrap();
        assert_eq!(resp.transcription, "I like mangoes");
        assert_eq!(resp.response, "Lovely! What colour is a mango?");
    }

    #[tokio::test]
    async fn test_speech_and_code() {
        let api = client(ScriptedModel::default(), FixedTranscriber::new("")).await;
        let wav = api.speech("Shabash!", None).await.unwrap();
        assert_eq!(&wav[0..4], b"RIFF");

        let out = api.run_code("import os", "user_7").await.unwrap();
        assert_eq!(out.output, sogo_core::code_policy::SECURITY_ALERT);

        let quiz = api.career_quiz("stories").await.unwrap();
        assert_eq!(quiz.primary.lab, "English Lab");
        let finder = api.lab_finder("").await.unwrap();
        assert_eq!(finder.options[0].value, "start");
        let finder = api.lab_finder("logic").await.unwrap();
        assert_eq!(
            finder.recommendation,
            Some(sogo_core::finder::Recommendation::Python)
        );
    }
}
