//! Skill XP derived from completed module names.

use serde::{Deserialize, Serialize};

/// Per-skill score, 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xp {
    #[serde(rename = "Logic")]
    pub logic: u32,
    #[serde(rename = "Frontend")]
    pub frontend: u32,
    #[serde(rename = "Database")]
    pub database: u32,
}

/// Starter XP shown to guests and learners with no saved progress.
pub const STARTER_XP: Xp = Xp {
    logic: 5,
    frontend: 5,
    database: 5,
};

const POINTS_PER_MODULE: u32 = 20;
const MAX_SCORE: u32 = 100;

const LOGIC_KEYWORDS: &[&str] = &["logic", "loop", "condition", "umpire", "auditor"];
const FRONTEND_KEYWORDS: &[&str] = &["menu", "html", "string", "ui", "stadium"];
const DATABASE_KEYWORDS: &[&str] = &["variable", "list", "dictionary", "csv", "wallet", "ledger"];

pub fn is_guest(user_id: &str) -> bool {
    user_id.is_empty() || user_id == "guest"
}

/// Score completed modules. A module counts once toward every skill whose
/// keywords it mentions.
pub fn calculate<'a>(completed: impl IntoIterator<Item = &'a str>) -> Xp {
    let (mut logic, mut frontend, mut database) = (0u32, 0u32, 0u32);
    for name in completed {
        let name = name.to_lowercase();
        let hits = |keys: &[&str]| keys.iter().any(|k| name.contains(k));
        if hits(LOGIC_KEYWORDS) {
            logic += 1;
        }
        if hits(FRONTEND_KEYWORDS) {
            frontend += 1;
        }
        if hits(DATABASE_KEYWORDS) {
            database += 1;
        }
    }
    let score = |n: u32| (n * POINTS_PER_MODULE).min(MAX_SCORE);
    Xp {
        logic: score(logic),
        frontend: score(frontend),
        database: score(database),
    }
}

/// Efficiency of a completed module: fewer tutor turns score higher.
pub fn efficiency_score(steps: u32) -> u32 {
    100u32.saturating_sub(steps.saturating_mul(2)).max(10)
}
