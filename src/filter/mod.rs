// src/filter/mod.rs
//! # Filter Engine
//! Per-message admission decision for a live chat stream.
//!
//! Order (each step can end the decision early):
//! 1) rate window: record arrival → (mps, active)
//! 2) per-user cooldown: near-identical repeat too soon → block
//! 3) role bypass lookup
//! 4) cross-user dedup (skipped when bypassed) → block, not remembered
//! 5) remember text in the dedup window
//! 6) word bar = 3 + floor(mps / 2)
//! 7) while active and not bypassed: non-greeting, non-substantive → block
//! 8) admit
//!
//! Cooldown state is updated in step 2 even if a later step blocks; moving
//! steps around changes what gets suppressed.

pub mod bypass;
pub mod cooldown;
pub mod dedup;
pub mod similarity;
pub mod substance;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConfigHandle;
use crate::event::ChatEvent;
use crate::rate::{RateState, RateTracker};

pub use bypass::{bypass_for, RoleBypass};
pub use cooldown::CooldownGate;
pub use dedup::DedupWindow;
pub use similarity::similarity;
pub use substance::{is_greeting, is_substantive, min_words_for};

/// Which gate stopped a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Cooldown,
    Duplicate,
    NotSubstantive,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Cooldown => "cooldown",
            BlockReason::Duplicate => "duplicate",
            BlockReason::NotSubstantive => "not_substantive",
        }
    }
}

/// Outcome for one event, plus the rate it was judged at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub admit: bool,
    pub messages_per_second: f64,
    pub filter_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockReason>,
    /// Role bypass was granted (false when cooldown blocked first).
    #[serde(default)]
    pub bypass: bool,
}

impl Decision {
    pub fn admitted(rate: RateState, bypass: bool) -> Self {
        Self {
            admit: true,
            messages_per_second: rate.messages_per_second,
            filter_active: rate.filter_active,
            blocked_by: None,
            bypass,
        }
    }

    pub fn blocked(rate: RateState, reason: BlockReason, bypass: bool) -> Self {
        Self {
            admit: false,
            messages_per_second: rate.messages_per_second,
            filter_active: rate.filter_active,
            blocked_by: Some(reason),
            bypass,
        }
    }

    pub fn rate(&self) -> RateState {
        RateState {
            messages_per_second: self.messages_per_second,
            filter_active: self.filter_active,
        }
    }
}

/// Owns all temporal filter state. Meant to live on a single worker; see
/// [`crate::worker`].
#[derive(Debug)]
pub struct FilterEngine {
    config: ConfigHandle,
    rate: RateTracker,
    cooldown: CooldownGate,
    dedup: DedupWindow,
}

impl FilterEngine {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            rate: RateTracker::new(),
            cooldown: CooldownGate::new(),
            dedup: DedupWindow::new(),
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Decide at the event's own receive time.
    pub fn decide(&mut self, event: &ChatEvent) -> Decision {
        self.decide_at(event, event.received_at)
    }

    /// Decide using `now` as the arrival time.
    pub fn decide_at(&mut self, event: &ChatEvent, now: DateTime<Utc>) -> Decision {
        // One snapshot per decision; concurrent retuning applies to the next event.
        let cfg = self.config.current();

        let rate = self.rate.record(now, cfg.mps_threshold);

        let decision = if !self
            .cooldown
            .allow(&event.user, &event.text, now, cfg.cooldown_secs)
        {
            Decision::blocked(rate, BlockReason::Cooldown, false)
        } else {
            let bypass = bypass_for(&event.roles, &cfg.role_bypass);
            if !bypass && self.dedup.is_duplicate(&event.text, cfg.similarity_threshold) {
                Decision::blocked(rate, BlockReason::Duplicate, bypass)
            } else {
                self.dedup.record(&event.text);

                let min_words = min_words_for(rate.messages_per_second);
                if rate.filter_active
                    && !bypass
                    && !is_greeting(&event.text)
                    && !is_substantive(&event.text, min_words)
                {
                    Decision::blocked(rate, BlockReason::NotSubstantive, bypass)
                } else {
                    Decision::admitted(rate, bypass)
                }
            }
        };

        crate::metrics::record_decision(&decision);
        crate::debug::record_decision(&decision);
        crate::debug::dev_log_decision(event, &decision);
        decision
    }

    /// Arrivals currently inside the rate window.
    pub fn window_len(&self) -> usize {
        self.rate.len()
    }

    pub fn users_seen(&self) -> usize {
        self.cooldown.len()
    }

    pub fn history_len(&self) -> usize {
        self.dedup.len()
    }
}
