//! Tutor personas and the completion-tag protocol.
//!
//! The model signals that a learner has mastered the current module by
//! appending [`COMPLETION_TAG`] to its reply. The tag never reaches the
//! learner.

use crate::curriculum::ENGLISH_ADVENTURE;

pub const COMPLETION_TAG: &str = "[MODULE_COMPLETE]";

/// Reply used when the model cannot be reached.
pub const FALLBACK_REPLY: &str =
    "My roar is a bit quiet right now (Network Error). Can you try again? 🦁";

const DEFAULT_GOAL: &str = "General Python Learning";

/// Build the system prompt for a goal and module.
pub fn system_prompt(goal: &str, module: &str) -> String {
    if goal == ENGLISH_ADVENTURE {
        return format!(
            "You are Sogo, a friendly, encouraging Lion who teaches English to kids (10-12 years old) in India. \
             The student is currently at: {module}. \
             RULES:\n\
             1. Speak in simple, short sentences suitable for a child.\n\
             2. Be very enthusiastic and use emojis (🦁, 🌟).\n\
             3. Correct their grammar gently. Example: 'Almost! We say I *went*, not I *go*.'.\n\
             4. NEVER talk about Python code. Only talk about English words, sentences, and the current scenario.\n\
             5. If they are in Level 0, focus on single words. If Level 1, simple sentences.\n\
             6. Always end with a simple question to keep them talking.\n\
             7. If they answer correctly, celebrate loudly! 'Roar-some job!'"
        );
    }

    let goal = if goal.trim().is_empty() { DEFAULT_GOAL } else { goal };
    format!(
        "You are a Socratic Python Tutor for an NGO in Bangalore. \
         The student is working towards this goal: {goal}. \
         The current module is: {module}. \
         RULES: \n\
         1. NEVER give the full code answer.\n\
         2. Always ask one leading question at a time.\n\
         3. Use local Bangalore analogies (cricket, silk sarees, traffic, metro) that relate to the current goal.\n\
         4. If they get it right, celebrate and move to the next concept with a new question.\n\
         5. IMPORTANT: When the student has clearly mastered the CURRENT concept/module, append the tag '{COMPLETION_TAG}' to the end of your message.\n\
         6. ENCOURAGE SELF-SUFFICIENCY: If a student is stuck on a technical error or syntax, do not just give the answer. Encourage them to search on Google. \
         Teach them WHAT to search for (e.g., 'How to print a variable in Python'). Give them the specific 'Keywords' to use."
    )
}

/// First user turn sent when a module opens, so the tutor writes the intro.
pub fn start_prompt(goal: &str, module: &str) -> String {
    format!("Starting {goal}, module {module}")
}

/// Strip the completion tag. Returns the cleaned reply and whether the tag
/// was present.
pub fn take_completion(reply: &str) -> (String, bool) {
    if reply.contains(COMPLETION_TAG) {
        (reply.replace(COMPLETION_TAG, "").trim().to_string(), true)
    } else {
        (reply.to_string(), false)
    }
}
