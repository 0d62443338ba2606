//! Error types for the tutoring engine.
//!
//! One enum for every fallible operation in sogo-lib. The HTTP layer maps
//! each variant to a status code and a `{"detail": ...}` body.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use sogo_core::types::ErrorBody;

/// The main error type for sogo-lib operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    #[error("invalid configuration: {message}")]
    ConfigValidation { message: String },

    // === Request Errors ===
    /// The client sent something we cannot act on.
    #[error("{0}")]
    BadRequest(String),

    // === Upstream Errors ===
    /// The chat model endpoint failed or returned something unusable.
    #[error("chat model error: {0}")]
    Model(String),

    /// Speech-to-text failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Text-to-speech failed.
    #[error("speech synthesis failed: {0}")]
    Speech(String),

    /// The text had nothing a voice could read out.
    #[error("nothing to say")]
    NothingToSay,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Sandbox Errors ===
    #[error("failed to start interpreter '{program}': {source}")]
    Interpreter {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A blocking store call panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    // === Audio Errors ===
    #[error("audio error: {0}")]
    Audio(String),

    /// The voice turn was driven out of order.
    #[error("voice turn: {0}")]
    VoiceTurn(#[from] sogo_core::voice::InvalidTransition),

    // === I/O and Serialization ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The tutoring server answered with an error status.
    #[error("server returned {status}: {detail}")]
    Api { status: u16, detail: String },
}

/// A specialized Result type for sogo-lib operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<sogo_core::curriculum::UnknownGoal> for Error {
    fn from(_: sogo_core::curriculum::UnknownGoal) -> Self {
        Self::BadRequest("Invalid Goal".to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl Error {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    #[must_use]
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    #[must_use]
    pub fn transcription(message: impl Into<String>) -> Self {
        Self::Transcription(message.into())
    }

    #[must_use]
    pub fn speech(message: impl Into<String>) -> Self {
        Self::Speech(message.into())
    }

    #[must_use]
    pub fn audio(message: impl Into<String>) -> Self {
        Self::Audio(message.into())
    }

    /// HTTP status this error is reported with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::NothingToSay | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Model(_) | Self::Transcription(_) | Self::Speech(_) | Self::Http(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Bad requests carry their text verbatim.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Api { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("request rejected: {self}");
        }
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NothingToSay.to_string(), "nothing to say");
        assert_eq!(
            Error::model("quota exceeded").to_string(),
            "chat model error: quota exceeded"
        );
    }

    #[test]
    fn test_unknown_goal_is_invalid_goal() {
        let err: Error = sogo_core::curriculum::UnknownGoal("Knitting".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Invalid Goal");
    }

    #[test]
    fn test_upstream_errors_are_bad_gateway() {
        assert_eq!(Error::transcription("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(Error::speech("x").status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_audio_is_server_error() {
        let err = Error::audio("no microphone found");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "audio error: no microphone found");
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_voice_transition_error() {
        let mut turn = sogo_core::voice::VoiceTurn::new();
        let err: Error = turn.release().unwrap_err().into();
        assert!(err.to_string().contains("Release"));
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_request() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;

        let req = Request::builder()
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let rejection = Json::<serde_json::Value>::from_request(req, &())
            .await
            .unwrap_err();
        let err = Error::from(rejection);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!err.detail().is_empty());
    }
}
