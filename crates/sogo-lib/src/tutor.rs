//! Socratic tutor: persona prompt + conversation → one reply.

use std::sync::Arc;

use tracing::{error, info};

use sogo_core::persona::{system_prompt, FALLBACK_REPLY};
use sogo_core::types::{ChatMessage, Role};

use crate::llm::ChatModel;

#[derive(Clone)]
pub struct SocraticTutor {
    model: Arc<dyn ChatModel>,
}

impl SocraticTutor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Ask the tutor for its next turn.
    ///
    /// Only user and assistant turns from `history` are forwarded. A failed
    /// model call never reaches the learner as an error; they get
    /// [`FALLBACK_REPLY`] and can try again.
    pub async fn reply(
        &self,
        goal: &str,
        module: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> String {
        let system = system_prompt(goal, module);

        let mut conversation: Vec<ChatMessage> = history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .cloned()
            .collect();
        conversation.push(ChatMessage::user(message));

        match self.model.complete(&system, &conversation).await {
            Ok(reply) => {
                info!(goal, module, turns = conversation.len(), "tutor replied");
                reply
            }
            Err(e) => {
                error!("chat model failed: {e}");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{Error, Result};

    /// Replays scripted replies and records what it was asked.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<Vec<Result<String>>>,
        pub calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                calls: Mutex::default(),
            }
        }

        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), messages.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::model("script exhausted")))
        }
    }

    #[tokio::test]
    async fn test_reply_passes_prompt_and_filtered_history() {
        let model = Arc::new(ScriptedModel::replying("What does print do?"));
        let tutor = SocraticTutor::new(model.clone());

        let history = vec![
            ChatMessage::assistant("Welcome to the Stadium!"),
            ChatMessage {
                role: Role::Other,
                content: "system noise".into(),
            },
        ];
        let reply = tutor
            .reply("Cricket Game", "The Stadium (I/O)", &history, "hi")
            .await;
        assert_eq!(reply, "What does print do?");

        let calls = model.calls.lock().unwrap();
        let (system, sent) = &calls[0];
        assert!(system.contains("Cricket Game"));
        assert!(system.contains("The Stadium (I/O)"));
        assert_eq!(
            sent,
            &vec![
                ChatMessage::assistant("Welcome to the Stadium!"),
                ChatMessage::user("hi")
            ]
        );
    }

    #[tokio::test]
    async fn test_model_failure_falls_back() {
        let model = Arc::new(ScriptedModel::new(vec![Err(Error::model("timeout"))]));
        let tutor = SocraticTutor::new(model);
        let reply = tutor.reply("English Adventure", "Level 0", &[], "hello").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }
}
