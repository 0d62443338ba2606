//! Tutoring service: what each API endpoint does, independent of HTTP.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use sogo_core::curriculum::{self, catalog, resolve_start, Catalog, TRACKS};
use sogo_core::finder::{self, FinderReply, QuizChoice, QuizResult};
use sogo_core::persona::{start_prompt, take_completion};
use sogo_core::types::{
    ChatMessage, ChatRequest, ChatResponse, CodeResponse, HealthResponse, Progress,
    ProgressResponse, Role,
    StartModuleRequest, StartModuleResponse, VoiceChatResponse,
};
use sogo_core::xp::{self, STARTER_XP};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::{ChatModel, OpenAiCompatModel};
use crate::sandbox::CodeRunner;
use crate::store::{Completion, Store};
use crate::stt::{Transcriber, WhisperClient};
use crate::tts::{SpeechClient, SpeechSynth};
use crate::tutor::SocraticTutor;

pub const SERVICE_NAME: &str = "SOGO Backend";

/// Cloneable handle shared by every request.
#[derive(Clone)]
pub struct TutorService {
    store: Arc<Store>,
    tutor: SocraticTutor,
    transcriber: Arc<dyn Transcriber>,
    speech: Arc<dyn SpeechSynth>,
    runner: CodeRunner,
}

/// Fields of a voice chat upload.
#[derive(Debug, Clone)]
pub struct VoiceTurnRequest {
    pub audio: Vec<u8>,
    pub user_id: String,
    pub history: Vec<ChatMessage>,
    pub module_name: String,
    pub goal: String,
}

impl TutorService {
    pub fn new(
        store: Arc<Store>,
        model: Arc<dyn ChatModel>,
        transcriber: Arc<dyn Transcriber>,
        speech: Arc<dyn SpeechSynth>,
        runner: CodeRunner,
    ) -> Self {
        Self {
            store,
            tutor: SocraticTutor::new(model),
            transcriber,
            speech,
            runner,
        }
    }

    /// Wire up the real store and upstream clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a client cannot
    /// be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.llm.api_key.is_empty() {
            warn!("no chat model API key configured; tutor replies will fall back");
        }
        if config.stt.api_key.is_empty() {
            warn!("no transcription API key configured; voice chat will fail");
        }

        let store = Arc::new(Store::open(config.database_path())?);
        Ok(Self::new(
            store,
            Arc::new(OpenAiCompatModel::new(config.llm.clone())?),
            Arc::new(WhisperClient::new(config.stt.clone())?),
            Arc::new(SpeechClient::new(config.tts.clone())?),
            CodeRunner::new(&config.sandbox),
        ))
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".into(),
            service: SERVICE_NAME.into(),
        }
    }

    /// Coding tracks and their modules.
    pub fn curriculum(&self) -> BTreeMap<&'static str, &'static [&'static str]> {
        TRACKS.iter().map(|t| (t.goal, t.modules)).collect()
    }

    pub fn labs(&self) -> Catalog {
        catalog()
    }

    /// Run a store call on the blocking pool; rusqlite is synchronous.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    /// Create the learner if needed and read their saved progress.
    async fn load_learner(&self, user_id: &str) -> Result<Option<Progress>> {
        let user_id = user_id.to_string();
        self.with_store(move |store| {
            store.ensure_user(&user_id)?;
            store.progress(&user_id)
        })
        .await
    }

    /// Saved position and skill XP. Creates the learner on first sight.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn progress(&self, user_id: &str) -> Result<ProgressResponse> {
        let progress = self.load_learner(user_id).await?;

        let xp = match &progress {
            Some(p) if !xp::is_guest(user_id) => xp::calculate(p.completed.keys().map(String::as_str)),
            _ => STARTER_XP,
        };
        Ok(ProgressResponse { progress, xp })
    }

    /// Open a module and produce the tutor's first message.
    ///
    /// # Errors
    ///
    /// Unknown goals are a bad request. Store failures propagate.
    pub async fn start_module(&self, req: &StartModuleRequest) -> Result<StartModuleResponse> {
        let saved = self.load_learner(&req.user_id).await?;

        let start = resolve_start(
            &req.goal,
            req.module_name.as_deref(),
            saved.as_ref().map(|p| (p.goal.as_str(), p.module.as_str())),
        )?;

        let intro_message = match start.scripted_intro {
            Some(intro) => intro.to_string(),
            None => {
                let opener = start_prompt(&req.goal, &start.module);
                let reply = self.tutor.reply(&req.goal, &start.module, &[], &opener).await;
                take_completion(&reply).0
            }
        };

        info!(user = %req.user_id, goal = %req.goal, module = %start.module, "module started");
        Ok(StartModuleResponse {
            module: start.module,
            intro_message,
            all_modules: start.all_modules,
        })
    }

    /// One tutor turn. When the tutor marks the module as mastered the
    /// learner moves to the next module and the finished one is recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if saving progress fails.
    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let reply = self
            .tutor
            .reply(&req.goal, &req.module_name, &req.history, &req.message)
            .await;
        let (response, module_complete) = take_completion(&reply);

        let mut next_module = req.module_name.clone();
        if module_complete {
            match curriculum::next_module(&req.goal, &req.module_name) {
                Some(next) => {
                    next_module = next.to_string();
                    if !xp::is_guest(&req.user_id) {
                        let steps = learner_turns(&req.history) + 1;
                        let (user_id, goal, finished) =
                            (req.user_id.clone(), req.goal.clone(), req.module_name.clone());
                        self.with_store(move |store| {
                            store.save_progress(
                                &user_id,
                                &goal,
                                next,
                                Some(Completion {
                                    module: &finished,
                                    steps,
                                }),
                            )
                        })
                        .await?;
                    }
                    info!(user = %req.user_id, from = %req.module_name, to = next, "module complete");
                }
                None => info!(user = %req.user_id, module = %req.module_name, "final module complete"),
            }
        }

        Ok(ChatResponse {
            response,
            module_complete,
            next_module,
        })
    }

    /// Transcribe a recording and answer it.
    ///
    /// # Errors
    ///
    /// Returns an error if transcription fails or hears nothing.
    pub async fn voice_chat(&self, req: VoiceTurnRequest) -> Result<VoiceChatResponse> {
        let transcription = self.transcriber.transcribe(req.audio).await?;
        if transcription.is_empty() {
            return Err(Error::transcription("no speech detected"));
        }

        let reply = self
            .tutor
            .reply(&req.goal, &req.module_name, &req.history, &transcription)
            .await;

        Ok(VoiceChatResponse {
            transcription,
            response: take_completion(&reply).0,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the interpreter cannot be started.
    pub async fn run_code(&self, code: &str) -> Result<CodeResponse> {
        let output = self.runner.run(code).await?;
        Ok(CodeResponse { output })
    }

    /// Synthesize a reply as WAV.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingToSay`] for unspeakable text, or the speech
    /// server's failure.
    pub async fn speak(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        self.speech.synthesize(text, voice).await
    }

    /// Next lab finder message. An empty value opens the dialog.
    pub fn lab_finder(&self, value: &str) -> FinderReply {
        if value.trim().is_empty() {
            finder::opening()
        } else {
            finder::answer(value)
        }
    }

    /// # Errors
    ///
    /// Returns a bad request for an unknown choice.
    pub fn career_quiz(&self, choice: &str) -> Result<QuizResult> {
        let choice: QuizChoice = choice.parse().map_err(|e| Error::bad_request(format!("{e}")))?;
        Ok(finder::quiz_result(choice))
    }
}

fn learner_turns(history: &[ChatMessage]) -> u32 {
    let n = history.iter().filter(|m| m.role == Role::User).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}
