// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod debug;
pub mod event;
pub mod filter;
pub mod irc;
pub mod metrics;
pub mod rate;
pub mod worker;

// ---- Re-exports for stable public API ----
pub use crate::config::{ConfigHandle, FilterConfig};
pub use crate::event::{ChatEvent, RoleTag};
pub use crate::filter::{BlockReason, Decision, FilterEngine};
pub use crate::rate::RateState;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Queue depth between the HTTP front and the filter worker.
const WORKER_QUEUE: usize = 1024;
/// Notices kept for slow presentation subscribers.
const NOTICE_BUFFER: usize = 256;

/// Build the full in-process app: settings, filter worker, router.
///
/// Settings come from `$CHATGATE_SETTINGS_PATH`, `config/chatgate.toml` or
/// `settings.json` (first found), then env overrides. Hot reload of that file
/// starts when `CHATGATE_HOT_RELOAD=1`. Retuning over HTTP is saved back to the
/// same file, or to `settings.json` when none existed.
pub async fn app() -> anyhow::Result<axum::Router> {
    let settings = config::load_settings_default()?;
    let cfg = settings.filter_config().with_env_overrides();
    let handle = ConfigHandle::new(cfg);

    let resolved = config::resolve_settings_path()?;
    if let Some(path) = &resolved {
        config::start_hot_reload_thread(handle.clone(), path.clone());
    }
    let settings_path =
        resolved.unwrap_or_else(|| PathBuf::from(config::DEFAULT_SETTINGS_JSON));

    let observer = Arc::new(worker::BroadcastObserver::new(NOTICE_BUFFER));
    let engine = FilterEngine::new(handle.clone());
    let client = worker::spawn_worker(engine, observer.clone(), WORKER_QUEUE).detach();

    let metrics = crate::metrics::Metrics::init();

    info!(
        target: "chatgate",
        mps_threshold = cfg.mps_threshold,
        cooldown_secs = cfg.cooldown_secs,
        similarity_threshold = cfg.similarity_threshold,
        "filter ready"
    );

    let state = api::AppState {
        client,
        config: handle,
        observer,
        settings_path: Some(settings_path),
    };
    Ok(api::router(state, metrics.as_ref()))
}
