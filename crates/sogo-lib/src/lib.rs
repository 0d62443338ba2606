//! sogo-lib — Tutoring service engine.
//!
//! Progress store, chat model and speech clients, code sandbox, HTTP API,
//! and the terminal voice pipeline (capture, playback, API client).
//! Depends on sogo-core for pure types and tutoring rules.

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod playback;
pub mod sandbox;
pub mod server;
pub mod service;
pub mod store;
pub mod stt;
pub mod tts;
pub mod tutor;
pub mod voice;

pub use error::{Error, Result};

// Re-export sogo-core for convenience
pub use sogo_core;
