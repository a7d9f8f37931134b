//! Substantiveness heuristics: is a message worth showing while chat is busy?
//!
//! Rules, in order:
//! - fewer than `min_words` word tokens → reject
//! - any char repeated 5+ times in a row ("aaaaa") → reject
//! - a 1–4 char word repeated 3+ times in a row ("gg gg gg") → reject
//! - emote tokens (`:name:`) over half the word-token count → reject
//!
//! Greetings are recognised separately; the engine lets them through even
//! when they fail these rules.

use once_cell::sync::Lazy;
use regex::Regex;

/// Base word bar; the engine raises it by one per 2 MPS.
pub const BASE_MIN_WORDS: usize = 3;
pub const MAX_EMOTE_RATIO: f64 = 0.5;
const CHAR_RUN_LIMIT: usize = 5;
const WORD_RUN_LIMIT: usize = 3;
const SHORT_WORD_MAX_CHARS: usize = 4;

pub const GREETINGS: [&str; 8] = [
    "hi",
    "hello",
    "hey",
    "sup",
    "yo",
    "hiya",
    "good morning",
    "good evening",
];

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word regex"));
static RE_EMOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r":[a-zA-Z0-9_]+:").expect("emote regex"));

/// Case-folded word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    RE_WORD
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Word bar for the current throughput: `3 + floor(mps / 2)`.
pub fn min_words_for(mps: f64) -> usize {
    let extra = (mps / 2.0).floor();
    if extra.is_finite() && extra > 0.0 {
        BASE_MIN_WORDS + extra as usize
    } else {
        BASE_MIN_WORDS
    }
}

pub fn is_greeting(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    GREETINGS.contains(&t.as_str())
}

pub fn is_substantive(text: &str, min_words: usize) -> bool {
    let tokens = tokenize(text);
    if tokens.len() < min_words {
        return false;
    }

    if has_char_run(text) || has_short_word_run(text) {
        return false;
    }

    let emotes = RE_EMOTE.find_iter(text).count();
    if !tokens.is_empty() && emotes as f64 / tokens.len() as f64 > MAX_EMOTE_RATIO {
        return false;
    }

    true
}

/// Same char 5+ times in a row. Newlines never count as a run.
fn has_char_run(text: &str) -> bool {
    let mut prev: Option<char> = None;
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            prev = None;
            run = 0;
            continue;
        }
        if prev == Some(ch) {
            run += 1;
        } else {
            prev = Some(ch);
            run = 1;
        }
        if run >= CHAR_RUN_LIMIT {
            return true;
        }
    }
    false
}

/// A short word followed by whitespace-separated copies of itself, 3+ total.
fn has_short_word_run(text: &str) -> bool {
    let mut prev: Option<(String, usize)> = None;
    let mut run = 0usize;

    for m in RE_WORD.find_iter(text) {
        let word = m.as_str();
        let is_short = word.chars().count() <= SHORT_WORD_MAX_CHARS;
        let folded = word.to_lowercase();

        let continues = match &prev {
            Some((last, last_end)) => {
                let gap = &text[*last_end..m.start()];
                is_short
                    && *last == folded
                    && !gap.is_empty()
                    && gap.chars().all(char::is_whitespace)
            }
            None => false,
        };

        run = if continues { run + 1 } else { 1 };
        if is_short && run >= WORD_RUN_LIMIT {
            return true;
        }
        prev = Some((folded, m.end()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_folds_case_and_splits_on_non_word() {
        assert_eq!(tokenize("Hello, World! it's"), vec!["hello", "world", "it", "s"]);
    }

    #[test]
    fn word_bar_scales_with_rate() {
        assert_eq!(min_words_for(0.0), 3);
        assert_eq!(min_words_for(1.9), 3);
        assert_eq!(min_words_for(2.0), 4);
        assert_eq!(min_words_for(7.4), 6);
        assert_eq!(min_words_for(f64::NAN), 3);
    }

    #[test]
    fn short_messages_rejected() {
        assert!(!is_substantive("nice play", 3));
        assert!(is_substantive("nice play there", 3));
        assert!(!is_substantive("nice play there", 4));
    }

    #[test]
    fn repeated_short_word_rejected() {
        assert!(!is_substantive("gg gg gg", 3));
        assert!(!is_substantive("well LOL lol Lol that was fun", 3));
        assert!(is_substantive("gg gg everyone that was fun", 3));
        // long words are not spam signatures
        assert!(is_substantive("again again again and again", 3));
        // punctuation between copies breaks the run
        assert!(is_substantive("no, no, no this is wrong", 3));
    }

    #[test]
    fn char_runs_rejected() {
        assert!(!is_substantive("aaaaaaaaaa is cool today", 3));
        assert!(!is_substantive("what a play!!!!!", 3));
        assert!(is_substantive("what a play!!!!", 3));
    }

    #[test]
    fn emote_heavy_messages_rejected() {
        // 6 emotes, 10 word tokens (emote names count as words) -> 0.6
        let msg = ":a1: :b2: :c3: :d4: :e5: :f6: nice play right now";
        assert!(!is_substantive(msg, 3));
        // 2 emotes, 5 tokens -> 0.4
        assert!(is_substantive(":pog: that clutch was :wow:", 3));
    }

    #[test]
    fn plain_sentence_accepted() {
        assert!(is_substantive("the boss fight looks hard", 3));
    }

    #[test]
    fn greetings() {
        assert!(is_greeting("hey"));
        assert!(is_greeting("  Good Morning "));
        assert!(!is_greeting("hey there"));
        assert!(!is_greeting("goodmorning"));
    }
}
