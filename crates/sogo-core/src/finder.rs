//! Lab finder dialog tree and the career quiz.
//!
//! Both are fixed branching scripts; nothing here calls a model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Python,
    English,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinderOption {
    pub label: &'static str,
    pub value: &'static str,
}

/// One bot turn of the finder dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinderReply {
    pub content: &'static str,
    pub options: &'static [FinderOption],
    pub recommendation: Option<Recommendation>,
}

const OPENING_OPTIONS: &[FinderOption] = &[
    FinderOption {
        label: "Yes, help me choose! 🚀",
        value: "start",
    },
    FinderOption {
        label: "Just show me everything.",
        value: "all",
    },
];

const INSTINCT_OPTIONS: &[FinderOption] = &[
    FinderOption {
        label: "I want to build a tool to fix it. 🛠️",
        value: "build",
    },
    FinderOption {
        label: "I want to explain it clearly to others. 🗣️",
        value: "talk",
    },
];

const PREFERENCE_OPTIONS: &[FinderOption] = &[
    FinderOption {
        label: "Logic, Numbers, and Data? 🔢",
        value: "logic",
    },
    FinderOption {
        label: "Stories, Words, and People? 📝",
        value: "words",
    },
];

/// Greeting that opens the dialog.
pub fn opening() -> FinderReply {
    FinderReply {
        content: "Namaskara! I am the SOGO Guide. I can help you find your perfect learning path. Shall we start?",
        options: OPENING_OPTIONS,
        recommendation: None,
    }
}

/// Bot reply to the option the learner picked.
pub fn answer(value: &str) -> FinderReply {
    match value {
        "start" => FinderReply {
            content: "Great! First question: When you see a problem, what is your first instinct?",
            options: INSTINCT_OPTIONS,
            recommendation: None,
        },
        "build" => FinderReply {
            content: "Interesting! And do you prefer working with...",
            options: PREFERENCE_OPTIONS,
            recommendation: None,
        },
        "talk" | "words" => FinderReply {
            content: "I see! You value communication and connection. Based on this, I have a recommendation...",
            options: &[],
            recommendation: Some(Recommendation::English),
        },
        "logic" => FinderReply {
            content: "A builder at heart! You like structure and efficiency. I have just the place for you...",
            options: &[],
            recommendation: Some(Recommendation::Python),
        },
        _ => FinderReply {
            content: "No problem! You can explore all our labs below.",
            options: &[],
            recommendation: None,
        },
    }
}

// ─── Career quiz ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizChoice {
    Patterns,
    Stories,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChoice(pub String);

impl fmt::Display for UnknownChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown quiz choice '{}'; expected patterns, stories or both",
            self.0
        )
    }
}

impl std::error::Error for UnknownChoice {}

impl FromStr for QuizChoice {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patterns" => Ok(Self::Patterns),
            "stories" => Ok(Self::Stories),
            "both" => Ok(Self::Both),
            other => Err(UnknownChoice(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabMatch {
    pub lab: &'static str,
    #[serde(rename = "match")]
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizResult {
    pub primary: LabMatch,
    pub secondary: LabMatch,
}

const PYTHON_LAB: &str = "Python Lab";
const ENGLISH_LAB: &str = "English Lab";

pub fn quiz_result(choice: QuizChoice) -> QuizResult {
    let m = |lab, score| LabMatch { lab, score };
    match choice {
        QuizChoice::Patterns => QuizResult {
            primary: m(PYTHON_LAB, 95),
            secondary: m(ENGLISH_LAB, 40),
        },
        QuizChoice::Stories => QuizResult {
            primary: m(ENGLISH_LAB, 95),
            secondary: m(PYTHON_LAB, 40),
        },
        QuizChoice::Both => QuizResult {
            primary: m(PYTHON_LAB, 88),
            secondary: m(ENGLISH_LAB, 88),
        },
    }
}
