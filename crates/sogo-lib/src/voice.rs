//! Push-to-talk voice session against a tutoring server.
//!
//! The session owns the turn state and the conversation history. Device I/O
//! stays with the caller: it records between `press` and `submit`, plays the
//! returned WAV, then calls `playback_done` (or `press` again to barge in).
//!
//! ```text
//! press ─▶ Listening ─ submit(samples) ─▶ Processing ─▶ /voice_chat ─▶ Speaking ─▶ /speech
//!                                                  └─ failure ─▶ Idle + error
//! ```

use tracing::{debug, warn};

use sogo_core::types::ChatMessage;
use sogo_core::voice::{VoicePhase, VoiceTurn};
use sogo_core::wav::{compute_rms, write_wav, SAMPLE_RATE};

use crate::client::ApiClient;
use crate::error::{Error, Result};

/// Shortest recording worth uploading, 0.3 s at 16 kHz.
const MIN_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10;

/// Recordings quieter than this are treated as silence.
const SILENCE_RMS: f32 = 0.005;

/// Shown when a turn fails.
pub const RETRY_MESSAGE: &str = "Sorry, I couldn't understand that. Please try again.";

const NOTHING_HEARD_MESSAGE: &str = "I didn't hear anything. Hold the button while you speak.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Phase(VoicePhase),
    /// What the learner said.
    Heard(String),
    /// What the tutor answered.
    Replied(String),
    Failed(String),
}

type EventSink = Box<dyn FnMut(VoiceEvent) + Send>;

pub struct VoiceSession {
    api: ApiClient,
    user_id: String,
    goal: String,
    module_name: String,
    voice: Option<String>,
    history: Vec<ChatMessage>,
    turn: VoiceTurn,
    on_event: EventSink,
}

impl VoiceSession {
    pub fn new(
        api: ApiClient,
        user_id: impl Into<String>,
        goal: impl Into<String>,
        module_name: impl Into<String>,
    ) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            goal: goal.into(),
            module_name: module_name.into(),
            voice: None,
            history: Vec::new(),
            turn: VoiceTurn::new(),
            on_event: Box::new(|_| {}),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_events(mut self, on_event: impl FnMut(VoiceEvent) + Send + 'static) -> Self {
        self.on_event = Box::new(on_event);
        self
    }

    pub fn turn(&self) -> &VoiceTurn {
        &self.turn
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn emit(&mut self, event: VoiceEvent) {
        (self.on_event)(event);
    }

    fn fail(&mut self, message: &str) {
        self.turn.fail(message);
        self.emit(VoiceEvent::Failed(message.to_string()));
        self.emit(VoiceEvent::Phase(VoicePhase::Idle));
    }

    /// Start listening. While the tutor is speaking this is a barge-in and
    /// the caller should cut playback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VoiceTurn`] while a reply is being fetched.
    pub fn press(&mut self) -> Result<()> {
        self.turn.press()?;
        self.emit(VoiceEvent::Phase(VoicePhase::Listening));
        Ok(())
    }

    /// Send a finished recording and return the spoken reply as WAV.
    ///
    /// `Ok(None)` means the turn ended without audio to play: the recording
    /// was too short or silent, the server failed (the session is back to
    /// `Idle` with an error), or the reply could not be voiced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VoiceTurn`] if the session was not listening.
    pub async fn submit(&mut self, samples: &[i16]) -> Result<Option<Vec<u8>>> {
        self.turn.release()?;
        self.emit(VoiceEvent::Phase(VoicePhase::Processing));

        let level = compute_rms(samples);
        if samples.len() < MIN_SAMPLES || level < SILENCE_RMS {
            debug!("voice: not sending {} samples at level {level:.4}", samples.len());
            self.fail(NOTHING_HEARD_MESSAGE);
            return Ok(None);
        }

        let wav = write_wav(samples, SAMPLE_RATE);
        let resp = match self
            .api
            .voice_chat(wav, &self.user_id, &self.history, &self.module_name, &self.goal)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("voice: turn failed: {e}");
                self.fail(RETRY_MESSAGE);
                return Ok(None);
            }
        };

        self.history.push(ChatMessage::user(&resp.transcription));
        self.history.push(ChatMessage::assistant(&resp.response));
        self.turn
            .reply_ready(&resp.transcription, &resp.response)?;
        self.emit(VoiceEvent::Heard(resp.transcription));
        self.emit(VoiceEvent::Replied(resp.response.clone()));
        self.emit(VoiceEvent::Phase(VoicePhase::Speaking));

        match self.api.speech(&resp.response, self.voice.as_deref()).await {
            Ok(audio) => Ok(Some(audio)),
            Err(e) => {
                if !matches!(e, Error::Api { status: 400, .. }) {
                    warn!("voice: cannot voice reply: {e}");
                }
                self.playback_done()?;
                Ok(None)
            }
        }
    }

    /// The reply finished playing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VoiceTurn`] if nothing was being spoken.
    pub fn playback_done(&mut self) -> Result<()> {
        self.turn.playback_done()?;
        self.emit(VoiceEvent::Phase(VoicePhase::Idle));
        Ok(())
    }
}
