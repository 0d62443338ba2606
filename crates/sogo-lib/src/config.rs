//! Service configuration.
//!
//! Loaded with figment from (later sources override earlier):
//! 1. Default values
//! 2. TOML config file (if it exists)
//! 3. Environment variables prefixed with `SOGO_`, nested with `__`
//!    (e.g. `SOGO_LLM__MODEL=gemini-2.0-flash`)
//!
//! Provider keys left empty are filled from the usual `GEMINI_API_KEY` and
//! `GROQ_API_KEY` variables.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use sogo_core::text_prep::DEFAULT_MAX_CHUNK_LEN;

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";
const DATA_DIR_NAME: &str = "sogo";
const DATABASE_FILE_NAME: &str = "tutor.sqlite";

const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";
const GROQ_KEY_VAR: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `<data dir>/sogo/tutor.sqlite`.
    pub database_path: Option<PathBuf>,
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// OpenAI-compatible transcription endpoint (Whisper).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub timeout_secs: u64,
}

/// OpenAI-compatible speech endpoint (Kokoro or similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    pub voice: String,
    pub speed: f32,
    pub max_chunk_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter used to run learner code.
    pub python: String,
    pub timeout_secs: u64,
    /// Output beyond this many bytes is cut off.
    pub max_output_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 7860,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key: String::new(),
            model: "gemini-flash-latest".into(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key: String::new(),
            model: "whisper-large-v3".into(),
            language: "en".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".into(),
            voice: "af_heart".into(),
            speed: 1.0,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            timeout_secs: 5,
            max_output_bytes: 64 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let mut config: Config = Self::figment(config_file).extract()?;
        config.fill_provider_keys(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("SOGO_").split("__"))
    }

    /// Fill empty API keys from the providers' conventional variables.
    fn fill_provider_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.is_empty() {
            if let Some(key) = lookup(GEMINI_KEY_VAR) {
                self.llm.api_key = key;
            }
        }
        if self.stt.api_key.is_empty() {
            if let Some(key) = lookup(GROQ_KEY_VAR) {
                self.stt.api_key = key;
            }
        }
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigValidation { message });

        if self.server.port == 0 {
            return invalid("server.port must be greater than 0".into());
        }
        for (name, url) in [
            ("llm.base_url", &self.llm.base_url),
            ("stt.base_url", &self.stt.base_url),
            ("tts.base_url", &self.tts.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return invalid(format!("{name} must be an http(s) URL, got '{url}'"));
            }
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            ));
        }
        if !(0.25..=4.0).contains(&self.tts.speed) {
            return invalid(format!(
                "tts.speed must be between 0.25 and 4, got {}",
                self.tts.speed
            ));
        }
        if self.tts.max_chunk_len == 0 {
            return invalid("tts.max_chunk_len must be greater than 0".into());
        }
        if self.sandbox.timeout_secs == 0 {
            return invalid("sandbox.timeout_secs must be greater than 0".into());
        }
        if self.sandbox.python.trim().is_empty() {
            return invalid("sandbox.python must name an interpreter".into());
        }
        Ok(())
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// `host:port` to bind the HTTP server on.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
