//! Lab tracks, their module order, and the labs catalog.

use std::fmt;

use serde::Serialize;

/// Voice-first English track. It has no coding curriculum.
pub const ENGLISH_ADVENTURE: &str = "English Adventure";
pub const ENGLISH_ENTRY_MODULE: &str = "Level 0: The Explorer";
pub const ENGLISH_INTRO: &str = "Hello! I am Sogo. What is your name?";
pub const ENGLISH_LEVELS: &[&str] = &["Level 0", "Level 1", "Level 2"];

#[derive(Debug, Clone, Copy)]
pub struct Track {
    pub goal: &'static str,
    pub modules: &'static [&'static str],
}

pub const TRACKS: &[Track] = &[
    Track {
        goal: "Cricket Game",
        modules: &[
            "The Stadium (I/O)",
            "The Scoreboard (Variables)",
            "The Umpire (Conditionals)",
            "The Over (Loops)",
            "The Commentary (Functions)",
            "Match Recap (Git)",
        ],
    },
    Track {
        goal: "Food Blog",
        modules: &[
            "The Menu (Strings)",
            "The Foodies List (Lists)",
            "Hotel Cards (Dictionaries)",
            "The Generator (Loops)",
            "Go Live (File I/O)",
            "Cloud Launch (Infra)",
        ],
    },
    Track {
        goal: "Expense Tracker",
        modules: &[
            "The Wallet (Data Types)",
            "Daily Ledger (CSV)",
            "App Menu (Flow)",
            "The Auditor (Logic)",
            "The Workshop (Infra)",
            "Portfolio (Final)",
        ],
    },
];

/// Ordered modules of a coding track.
pub fn modules(goal: &str) -> Option<&'static [&'static str]> {
    TRACKS.iter().find(|t| t.goal == goal).map(|t| t.modules)
}

/// The module after `current`, or `None` if `current` is last or not part of
/// the track.
pub fn next_module(goal: &str, current: &str) -> Option<&'static str> {
    let modules = modules(goal)?;
    let idx = modules.iter().position(|m| *m == current)?;
    modules.get(idx + 1).copied()
}

pub fn is_voice_track(goal: &str) -> bool {
    goal == ENGLISH_ADVENTURE
}

/// Where a learner lands when opening a lab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPoint {
    pub module: String,
    pub all_modules: Vec<String>,
    /// Fixed opening line. `None` means the tutor writes the intro.
    pub scripted_intro: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGoal(pub String);

impl fmt::Display for UnknownGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown goal '{}'", self.0)
    }
}

impl std::error::Error for UnknownGoal {}

/// Pick the module to open.
///
/// An explicit `requested` module wins. Otherwise a saved position is resumed
/// only when it belongs to the same goal; anything else starts at module one.
/// `saved` is `(goal, module)`.
pub fn resolve_start(
    goal: &str,
    requested: Option<&str>,
    saved: Option<(&str, &str)>,
) -> Result<StartPoint, UnknownGoal> {
    let Some(track) = modules(goal) else {
        if is_voice_track(goal) {
            return Ok(StartPoint {
                module: ENGLISH_ENTRY_MODULE.to_string(),
                all_modules: ENGLISH_LEVELS.iter().map(|s| s.to_string()).collect(),
                scripted_intro: Some(ENGLISH_INTRO),
            });
        }
        return Err(UnknownGoal(goal.to_string()));
    };

    let module = match requested.filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => match saved {
            Some((saved_goal, saved_module)) if saved_goal == goal => saved_module.to_string(),
            _ => track[0].to_string(),
        },
    };

    Ok(StartPoint {
        module,
        all_modules: track.iter().map(|s| s.to_string()).collect(),
        scripted_intro: None,
    })
}

// ─── Labs catalog ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LabLevel {
    pub level: u8,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub description: &'static str,
    pub skills: &'static [&'static str],
    pub projects: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageLab {
    pub title: &'static str,
    pub description: &'static str,
    pub waitlist: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub programming: &'static [LabLevel],
    pub language: LanguageLab,
    /// The lab currently taking learners.
    pub open_lab: &'static str,
}

const PROGRAMMING_LEVELS: &[LabLevel] = &[
    LabLevel {
        level: 1,
        title: "The Junior Builder",
        subtitle: "Build Your Portfolio",
        description: "Start by building real tools. No boring theory. You learn logic, data, and UI by creating things you can use.",
        skills: &["Python Logic", "File I/O", "Basic Data Structures", "Git Version Control"],
        projects: &["Gully Cricket Game", "Food Blog Generator", "Kharcha (Expense) Tracker"],
    },
    LabLevel {
        level: 2,
        title: "The Software Architect",
        subtitle: "Think Like an Engineer",
        description: "Move beyond scripts. Learn how to structure complex applications, manage databases, and write clean, maintainable code.",
        skills: &["Backend Modules", "Persistent SQL Databases", "Advanced Styling", "System Design"],
        projects: &[],
    },
    LabLevel {
        level: 3,
        title: "The Full Stack Builder",
        subtitle: "Connect the Dots",
        description: "Bridge the gap between backend logic and frontend beauty. Build complete web applications that users love.",
        skills: &["FastAPI / REST APIs", "User Authentication", "React / Modern UI", "Cloud Deployment"],
        projects: &[],
    },
    LabLevel {
        level: 4,
        title: "The AI Engineer",
        subtitle: "Future Proofing",
        description: "The final frontier. Integrate Machine Learning and AI agents into your apps to solve problems intelligently.",
        skills: &["ML Heuristics", "AI Agents (LangChain)", "Scalable Architecture", "AI Dashboards"],
        projects: &[],
    },
];

pub fn catalog() -> Catalog {
    Catalog {
        programming: PROGRAMMING_LEVELS,
        language: LanguageLab {
            title: "Business English Lab",
            description: "An immersive experience to help you master Business English through real-world scenarios.",
            waitlist: true,
        },
        open_lab: "Python Logic Lab",
    }
}
