//! Wire types for the SOGO tutoring API.
//!
//! Shared by sogo-lib's server and client so both sides agree on the JSON
//! shapes without pulling in tokio or reqwest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::finder::Recommendation;
use crate::xp::Xp;

// ─── Conversation ──────────────────────────────────────────────────────────

/// Speaker of a conversation turn. Unknown roles are kept but never sent to
/// the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─── Requests ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub module_name: String,
    pub goal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartModuleRequest {
    pub user_id: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRequest {
    pub code: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinderRequest {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRequest {
    pub choice: String,
}

// ─── Responses ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub module_complete: bool,
    pub next_module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartModuleResponse {
    pub module: String,
    pub intro_message: String,
    pub all_modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeResponse {
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChatResponse {
    pub transcription: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub progress: Option<Progress>,
    pub xp: Xp,
}

/// `GET /curriculum`: goal → ordered module names.
pub type CurriculumResponse = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabLevelInfo {
    pub level: u8,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub skills: Vec<String>,
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageLabInfo {
    pub title: String,
    pub description: String,
    pub waitlist: bool,
}

/// `GET /labs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabsResponse {
    pub programming: Vec<LabLevelInfo>,
    pub language: LanguageLabInfo,
    pub open_lab: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderChoice {
    pub label: String,
    pub value: String,
}

/// `POST /lab_finder`: one bot turn. No options means the dialog is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderResponse {
    pub content: String,
    #[serde(default)]
    pub options: Vec<FinderChoice>,
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabScore {
    pub lab: String,
    #[serde(rename = "match")]
    pub score: u8,
}

/// `POST /career_quiz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub primary: LabScore,
    pub secondary: LabScore,
}

/// Error body, shaped like the `{"detail": ...}` the web client expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

// ─── Progress ──────────────────────────────────────────────────────────────

/// A learner's last known position and finished modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub goal: String,
    pub module: String,
    #[serde(default)]
    pub completed: BTreeMap<String, CompletedModule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedModule {
    #[serde(default)]
    pub steps: u32,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub efficiency_score: u32,
}
