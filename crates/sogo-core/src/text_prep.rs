//! Text preparation for spoken replies: markdown and emoji cleaning,
//! sentence splitting, and chunking for the speech endpoint.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

use crate::persona::COMPLETION_TAG;

// Compiled once, reused across calls. Patterns are literals, so `new` cannot fail.
static RE_FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static RE_INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#{1,6}\s*").unwrap());
static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static RE_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*]|\d+\.)\s+").unwrap());
static RE_EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{Extended_Pictographic}\x{FE0F}\x{200D}]").unwrap());
static RE_LEADING_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\s*").unwrap());
static RE_DOUBLE_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*\.").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

const CODE_PLACEHOLDER: &str = " Take a look at the code on screen. ";

/// Default maximum chunk length for [`chunk_for_speech`].
pub const DEFAULT_MAX_CHUNK_LEN: usize = 300;

/// Make a tutor reply read naturally when spoken.
///
/// Code blocks become a pointer to the screen, inline code keeps its text,
/// emphasis/headings/links/list markers are dropped, emoji are removed, and
/// a stray completion tag is stripped.
pub fn clean_text_for_speech(text: &str) -> String {
    let mut c = text.replace(COMPLETION_TAG, "");

    c = RE_FENCED_CODE.replace_all(&c, CODE_PLACEHOLDER).into_owned();
    c = RE_INLINE_CODE.replace_all(&c, "$1").into_owned();
    c = RE_HEADING.replace_all(&c, "").into_owned();
    c = RE_BULLET.replace_all(&c, ". ").into_owned();
    c = RE_BOLD.replace_all(&c, "$1").into_owned();
    c = RE_ITALIC.replace_all(&c, "$1").into_owned();
    c = RE_LINK.replace_all(&c, "$1").into_owned();
    c = RE_EMOJI.replace_all(&c, "").into_owned();
    c = RE_LEADING_DOT.replace(&c, "").into_owned();
    c = RE_DOUBLE_DOT.replace_all(&c, ".").into_owned();
    c = RE_MULTI_SPACE.replace_all(&c, " ").into_owned();

    c.trim().to_string()
}

/// True when the text has something a voice could say.
pub fn is_speakable(text: &str) -> bool {
    text.trim().chars().count() >= 2 && text.chars().any(char::is_alphanumeric)
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace, and
/// at paragraph breaks. Returns trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' && chars.peek() == Some(&'\n') {
            flush(&mut sentences, &mut current);
            while chars.peek() == Some(&'\n') {
                chars.next();
            }
            continue;
        }

        current.push(c);

        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            flush(&mut sentences, &mut current);
        }
    }
    flush(&mut sentences, &mut current);

    sentences
}

/// Group sentences into chunks of at most `max_len` bytes. A sentence longer
/// than `max_len` is split at a word boundary, or hard-split when there is
/// none in the back two thirds of the window.
pub fn chunk_for_speech(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let pieces = if sentence.len() > max_len {
            split_long(&sentence, max_len)
        } else {
            vec![sentence]
        };

        for piece in pieces {
            if !current.is_empty() && current.len() + 1 + piece.len() > max_len {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn flush(out: &mut Vec<String>, buf: &mut String) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    buf.clear();
}

fn split_long(text: &str, max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text.trim();

    while rest.len() > max_len {
        let window_end = floor_char_boundary(rest, max_len);
        let cut = match rest[..window_end].rfind(' ') {
            Some(pos) if pos >= max_len / 3 => pos,
            _ if window_end == 0 => rest.chars().next().map_or(rest.len(), char::len_utf8),
            _ => window_end,
        };
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── clean_text_for_speech ─────────────────────────────────────────

    #[test]
    fn replaces_fenced_code_blocks() {
        let input = "before ```python\nprint(runs)\n``` after";
        assert_eq!(
            clean_text_for_speech(input),
            "before Take a look at the code on screen. after"
        );
    }

    #[test]
    fn keeps_inline_code_text() {
        assert_eq!(clean_text_for_speech("try `print` here"), "try print here");
    }

    #[test]
    fn strips_emphasis() {
        assert_eq!(
            clean_text_for_speech("We say I *went*, not **go**"),
            "We say I went, not go"
        );
    }

    #[test]
    fn strips_headings_and_links() {
        assert_eq!(clean_text_for_speech("## Loops"), "Loops");
        assert_eq!(
            clean_text_for_speech("search [python for loop](https://google.com) now"),
            "search python for loop now"
        );
    }

    #[test]
    fn list_markers_become_pauses() {
        let result = clean_text_for_speech("Try:\n- print\n1. input");
        assert!(result.contains(". print"));
        assert!(result.contains(". input"));
    }

    #[test]
    fn strips_emoji() {
        assert_eq!(clean_text_for_speech("Roar-some job! 🦁🌟"), "Roar-some job!");
        assert_eq!(clean_text_for_speech("Tools 🛠️ ready"), "Tools ready");
    }

    #[test]
    fn strips_completion_tag() {
        assert_eq!(
            clean_text_for_speech("Well played! [MODULE_COMPLETE]"),
            "Well played!"
        );
    }

    #[test]
    fn collapses_whitespace_and_double_periods() {
        assert_eq!(clean_text_for_speech("over..  next    ball"), "over. next ball");
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(
            clean_text_for_speech("What is your name?"),
            "What is your name?"
        );
    }

    #[test]
    fn speakable() {
        assert!(is_speakable("Hi"));
        assert!(!is_speakable("🦁"));
        assert!(!is_speakable(" . "));
        assert!(!is_speakable(""));
    }

    // ── split_sentences ───────────────────────────────────────────────

    #[test]
    fn split_sentences_basic() {
        let s = split_sentences("Hello world. How are you? I am fine!");
        assert_eq!(s, vec!["Hello world.", "How are you?", "I am fine!"]);
    }

    #[test]
    fn split_sentences_paragraph_break() {
        let s = split_sentences("First paragraph\n\nSecond paragraph.");
        assert_eq!(s, vec!["First paragraph", "Second paragraph."]);
    }

    #[test]
    fn split_sentences_keeps_decimals() {
        let s = split_sentences("Run rate is 6.5 per over. Nice.");
        assert_eq!(s, vec!["Run rate is 6.5 per over.", "Nice."]);
    }

    #[test]
    fn split_sentences_empty() {
        assert!(split_sentences("   ").is_empty());
    }

    // ── chunk_for_speech ─────────────────────────────────────────────

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(
            chunk_for_speech("One. Two. Three.", 300),
            vec!["One. Two. Three."]
        );
    }

    #[test]
    fn groups_sentences_under_limit() {
        let chunks = chunk_for_speech("Aaaa aaaa. Bbbb bbbb. Cccc cccc.", 22);
        assert_eq!(chunks, vec!["Aaaa aaaa. Bbbb bbbb.", "Cccc cccc."]);
    }

    #[test]
    fn long_sentence_splits_at_words() {
        let text = "word ".repeat(40);
        let chunks = chunk_for_speech(text.trim(), 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 30, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn hard_splits_unbroken_text() {
        let text = "a".repeat(300);
        let chunks = chunk_for_speech(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 100));
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_char() {
        let text = "ನಮಸ್ಕಾರ".repeat(20);
        let chunks = chunk_for_speech(&text, 10);
        assert_eq!(chunks.concat(), text);
    }
}
