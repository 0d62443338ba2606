//! sogo-core — Pure types and tutoring rules.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod code_policy;
pub mod curriculum;
pub mod finder;
pub mod persona;
pub mod text_prep;
pub mod types;
pub mod voice;
pub mod wav;
pub mod xp;
