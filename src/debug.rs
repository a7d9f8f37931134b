//! Diagnostics: in-process decision counters and gated dev logging.
//!
//! Dev logs require BOTH `CHATGATE_DEV_LOG=1` and a dev environment (debug
//! build or `SHUTTLE_ENV` in {local, development, dev}). Raw chat text is
//! never logged; only a short hash of it.

use axum::{routing::get, Json, Router};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::event::ChatEvent;
use crate::filter::{BlockReason, Decision};

#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    pub total: u64,
    pub admitted: u64,
    pub blocked_cooldown: u64,
    pub blocked_duplicate: u64,
    pub blocked_not_substantive: u64,
    pub bypassed: u64,
    pub last_mps: Option<f64>,
    pub filter_active: bool,
}

static STATS: Lazy<Mutex<Stats>> = Lazy::new(|| Mutex::new(Stats::default()));

/// Counters stay usable after a panic elsewhere poisoned the lock.
fn stats() -> MutexGuard<'static, Stats> {
    STATS.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn record_decision(d: &Decision) {
    let mut s = stats();
    s.total += 1;
    match d.blocked_by {
        None => s.admitted += 1,
        Some(BlockReason::Cooldown) => s.blocked_cooldown += 1,
        Some(BlockReason::Duplicate) => s.blocked_duplicate += 1,
        Some(BlockReason::NotSubstantive) => s.blocked_not_substantive += 1,
    }
    if d.bypass {
        s.bypassed += 1;
    }
    s.last_mps = Some(d.messages_per_second);
    s.filter_active = d.filter_active;
}

pub fn snapshot() -> Stats {
    stats().clone()
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/debug/stats", get(|| async { Json(snapshot()) }))
}

pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("CHATGATE_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// First 6 bytes of SHA-256, hex.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub(crate) fn dev_log_decision(event: &ChatEvent, d: &Decision) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(&event.text);
    let user = anon_hash(&event.user);
    let reason = d.blocked_by.map(|r| r.as_str()).unwrap_or("admitted");
    info!(
        target: "chatgate",
        %id, %user,
        admit = d.admit,
        reason,
        mps = d.messages_per_second,
        active = d.filter_active,
        bypass = d.bypass,
        "decision"
    );
}
