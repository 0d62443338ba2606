//! HTTP API for the tutoring service.
//!
//! Runs on port 7860 by default. CORS-permissive so the web front end can
//! call it from any origin.

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use sogo_core::types::{
    ChatMessage, ChatRequest, ChatResponse, CodeRequest, CodeResponse, ErrorBody, FinderRequest,
    HealthResponse, ProgressRequest, ProgressResponse, QuizRequest, SpeechRequest,
    StartModuleRequest, StartModuleResponse, VoiceChatResponse,
};

use crate::error::{Error, Result};
use crate::service::{TutorService, VoiceTurnRequest};

/// Largest accepted voice upload.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the axum router around a shared [`TutorService`].
pub fn router(service: TutorService) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/curriculum", get(curriculum))
        .route("/labs", get(labs))
        .route("/progress", post(progress))
        .route("/start_module", post(start_module))
        .route("/chat", post(chat))
        .route(
            "/voice_chat",
            post(voice_chat).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/run_code", post(run_code))
        .route("/speech", post(speech))
        .route("/lab_finder", post(lab_finder))
        .route("/career_quiz", post(career_quiz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// `Json` whose rejections are reported as `{"detail": ...}` like every
/// other error.
struct JsonBody<T>(T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

async fn health(State(service): State<TutorService>) -> Json<HealthResponse> {
    Json(service.health())
}

async fn curriculum(State(service): State<TutorService>) -> impl IntoResponse {
    Json(service.curriculum())
}

async fn labs(State(service): State<TutorService>) -> impl IntoResponse {
    Json(service.labs())
}

async fn progress(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<ProgressRequest>,
) -> Result<Json<ProgressResponse>> {
    service.progress(&req.user_id).await.map(Json)
}

async fn start_module(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<StartModuleRequest>,
) -> Result<Json<StartModuleResponse>> {
    service.start_module(&req).await.map(Json)
}

async fn chat(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    service.chat(&req).await.map(Json)
}

/// Multipart fields: `audio` (file), `user_id`, `history` (JSON array),
/// `module_name`, `goal`. Every failure is reported as 500 with a detail.
async fn voice_chat(
    State(service): State<TutorService>,
    multipart: Multipart,
) -> std::result::Result<Json<VoiceChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let outcome = match read_voice_form(multipart).await {
        Ok(req) => service.voice_chat(req).await,
        Err(e) => Err(e),
    };
    outcome.map(Json).map_err(|e| {
        tracing::error!("voice chat failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                detail: e.to_string(),
            }),
        )
    })
}

async fn read_voice_form(mut multipart: Multipart) -> Result<VoiceTurnRequest> {
    let mut audio = None;
    let mut user_id = None;
    let mut history = None;
    let mut module_name = None;
    let mut goal = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::bad_request(format!("invalid upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let read_err = |e: axum::extract::multipart::MultipartError| {
            Error::bad_request(format!("cannot read field '{name}': {e}"))
        };
        match name.as_str() {
            "audio" => audio = Some(field.bytes().await.map_err(read_err)?.to_vec()),
            "user_id" => user_id = Some(field.text().await.map_err(read_err)?),
            "history" => history = Some(field.text().await.map_err(read_err)?),
            "module_name" => module_name = Some(field.text().await.map_err(read_err)?),
            "goal" => goal = Some(field.text().await.map_err(read_err)?),
            _ => {}
        }
    }

    let missing = |field: &str| Error::bad_request(format!("missing form field '{field}'"));
    let history: Vec<ChatMessage> = serde_json::from_str(&history.ok_or_else(|| missing("history"))?)?;

    Ok(VoiceTurnRequest {
        audio: audio.ok_or_else(|| missing("audio"))?,
        user_id: user_id.ok_or_else(|| missing("user_id"))?,
        history,
        module_name: module_name.ok_or_else(|| missing("module_name"))?,
        goal: goal.ok_or_else(|| missing("goal"))?,
    })
}

async fn run_code(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<CodeRequest>,
) -> Result<Json<CodeResponse>> {
    service.run_code(&req.code).await.map(Json)
}

async fn speech(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<SpeechRequest>,
) -> Result<Response> {
    let wav = service.speak(&req.text, req.voice.as_deref()).await?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

async fn lab_finder(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<FinderRequest>,
) -> impl IntoResponse {
    Json(service.lab_finder(&req.value))
}

async fn career_quiz(
    State(service): State<TutorService>,
    JsonBody(req): JsonBody<QuizRequest>,
) -> Result<impl IntoResponse> {
    service.career_quiz(&req.choice).map(Json)
}
