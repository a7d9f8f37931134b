use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::event::secs_between;
use crate::filter::similarity::similarity;

/// A repeat must be strictly more similar than this to be held back.
pub const REPEAT_SIMILARITY: f64 = 0.8;

#[derive(Debug, Clone)]
struct LastMessage {
    text: String,
    at: DateTime<Utc>,
}

/// Per-user short-term suppression of near-identical repeats.
///
/// Entries are never evicted; the map lives as long as the session.
#[derive(Debug, Default)]
pub struct CooldownGate {
    last: HashMap<String, LastMessage>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `text` repeats the user's last accepted message
    /// within `cooldown_secs`. A suppressed repeat leaves the stored message
    /// alone so it stays the baseline; anything else replaces it.
    pub fn allow(&mut self, user: &str, text: &str, now: DateTime<Utc>, cooldown_secs: f64) -> bool {
        let (last_text, last_at) = match self.last.get(user) {
            Some(m) => (m.text.as_str(), m.at),
            None => ("", DateTime::<Utc>::UNIX_EPOCH),
        };

        if secs_between(last_at, now) < cooldown_secs && similarity(text, last_text) > REPEAT_SIMILARITY {
            return false;
        }

        self.last.insert(
            user.to_string(),
            LastMessage {
                text: text.to_string(),
                at: now,
            },
        );
        true
    }

    /// Number of distinct users seen.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    /// Last accepted text for `user`, if any.
    pub fn last_text(&self, user: &str) -> Option<&str> {
        self.last.get(user).map(|m| m.text.as_str())
    }
}
