//! Push-to-talk turn state for the voice tutor.
//!
//! ```text
//!            press             release            reply_ready
//!   Idle ───────────▶ Listening ───────▶ Processing ───────────▶ Speaking
//!    ▲                                                           │   │
//!    └──────────────────────── playback_done ────────────────────┘   │
//!                              press (barge-in) ─▶ Listening ◀───────┘
//! ```
//!
//! `fail` returns to `Idle` from any phase and keeps the message for display.

use std::fmt;

use serde::Serialize;

/// Greeting shown before the first turn.
pub const VOICE_GREETING: &str = "Hello! I am Sogo. Ready to play?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePhase {
    Idle,
    Listening,
    Processing,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceInput {
    Press,
    Release,
    ReplyReady,
    PlaybackDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: VoicePhase,
    pub input: VoiceInput,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot apply {:?} while {:?}", self.input, self.from)
    }
}

impl std::error::Error for InvalidTransition {}

#[derive(Debug, Clone)]
pub struct VoiceTurn {
    phase: VoicePhase,
    transcript: String,
    reply: String,
    error: Option<String>,
}

impl Default for VoiceTurn {
    fn default() -> Self {
        Self {
            phase: VoicePhase::Idle,
            transcript: String::new(),
            reply: VOICE_GREETING.to_string(),
            error: None,
        }
    }
}

impl VoiceTurn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> VoicePhase {
        self.phase
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_listening(&self) -> bool {
        self.phase == VoicePhase::Listening
    }

    pub fn is_processing(&self) -> bool {
        self.phase == VoicePhase::Processing
    }

    pub fn is_speaking(&self) -> bool {
        self.phase == VoicePhase::Speaking
    }

    /// Start recording. Allowed while idle or while the reply is playing.
    pub fn press(&mut self) -> Result<(), InvalidTransition> {
        match self.phase {
            VoicePhase::Idle | VoicePhase::Speaking => {
                self.error = None;
                self.phase = VoicePhase::Listening;
                Ok(())
            }
            from => Err(InvalidTransition {
                from,
                input: VoiceInput::Press,
            }),
        }
    }

    /// Stop recording and hand the audio off.
    pub fn release(&mut self) -> Result<(), InvalidTransition> {
        self.step(VoicePhase::Listening, VoicePhase::Processing, VoiceInput::Release)
    }

    /// The service answered; start speaking the reply.
    pub fn reply_ready(
        &mut self,
        transcript: impl Into<String>,
        reply: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.step(
            VoicePhase::Processing,
            VoicePhase::Speaking,
            VoiceInput::ReplyReady,
        )?;
        self.transcript = transcript.into();
        self.reply = reply.into();
        Ok(())
    }

    pub fn playback_done(&mut self) -> Result<(), InvalidTransition> {
        self.step(VoicePhase::Speaking, VoicePhase::Idle, VoiceInput::PlaybackDone)
    }

    /// Abort the turn from any phase.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = VoicePhase::Idle;
        self.error = Some(message.into());
    }

    fn step(
        &mut self,
        expected: VoicePhase,
        next: VoicePhase,
        input: VoiceInput,
    ) -> Result<(), InvalidTransition> {
        if self.phase != expected {
            return Err(InvalidTransition {
                from: self.phase,
                input,
            });
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_greeting() {
        let t = VoiceTurn::new();
        assert_eq!(t.phase(), VoicePhase::Idle);
        assert_eq!(t.reply(), VOICE_GREETING);
        assert!(!t.is_listening() && !t.is_processing() && !t.is_speaking());
    }

    #[test]
    fn full_cycle() {
        let mut t = VoiceTurn::new();
        t.press().unwrap();
        assert!(t.is_listening());
        t.release().unwrap();
        assert!(t.is_processing());
        t.reply_ready("I like mangoes", "Roar-some job! What colour is a mango?")
            .unwrap();
        assert!(t.is_speaking());
        assert_eq!(t.transcript(), "I like mangoes");
        t.playback_done().unwrap();
        assert_eq!(t.phase(), VoicePhase::Idle);
    }

    #[test]
    fn release_without_press_is_rejected() {
        let mut t = VoiceTurn::new();
        let err = t.release().unwrap_err();
        assert_eq!(err.from, VoicePhase::Idle);
        assert_eq!(err.input, VoiceInput::Release);
        assert_eq!(t.phase(), VoicePhase::Idle);
    }

    #[test]
    fn cannot_press_while_processing() {
        let mut t = VoiceTurn::new();
        t.press().unwrap();
        t.release().unwrap();
        assert!(t.press().is_err());
        assert!(t.is_processing());
    }

    #[test]
    fn barge_in_while_speaking() {
        let mut t = VoiceTurn::new();
        t.press().unwrap();
        t.release().unwrap();
        t.reply_ready("hi", "hello").unwrap();
        t.press().unwrap();
        assert!(t.is_listening());
    }

    #[test]
    fn fail_returns_to_idle_and_next_press_clears_error() {
        let mut t = VoiceTurn::new();
        t.press().unwrap();
        t.release().unwrap();
        t.fail("Sorry, I couldn't understand that.");
        assert_eq!(t.phase(), VoicePhase::Idle);
        assert_eq!(t.error(), Some("Sorry, I couldn't understand that."));
        t.press().unwrap();
        assert_eq!(t.error(), None);
    }

    #[test]
    fn rejected_reply_keeps_previous_text() {
        let mut t = VoiceTurn::new();
        assert!(t.reply_ready("x", "y").is_err());
        assert_eq!(t.reply(), VOICE_GREETING);
        assert_eq!(t.transcript(), "");
    }
}
