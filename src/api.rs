use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::config::{self, ConfigHandle, FilterConfig};
use crate::event::{ChatEvent, RoleTag};
use crate::filter::{Decision, RoleBypass};
use crate::irc;
use crate::metrics::Metrics;
use crate::rate::RateState;
use crate::worker::{BroadcastObserver, FilterClient};

#[derive(Clone)]
pub struct AppState {
    pub client: FilterClient,
    pub config: ConfigHandle,
    pub observer: Arc<BroadcastObserver>,
    /// Where operator retuning is written back; `None` keeps it in memory.
    pub settings_path: Option<PathBuf>,
}

pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/decide", post(decide))
        .route("/ingest", post(ingest))
        .route("/config", get(get_config).put(put_config))
        .route("/config/threshold", patch(patch_threshold))
        .route("/config/bypass", patch(patch_bypass))
        .route("/status", get(status))
        .merge(crate::debug::router());

    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    router.layer(CorsLayer::very_permissive()).with_state(state)
}

/// Loose inbound event; missing fields fall back instead of failing.
/// `received_at` is kept on the event but the worker judges at its own
/// arrival clock.
#[derive(Debug, Default, Deserialize)]
pub struct ChatEventIn {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<RoleTag>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl ChatEventIn {
    pub fn into_event(self, now: DateTime<Utc>) -> ChatEvent {
        ChatEvent::new(
            self.user.unwrap_or_default(),
            self.text.unwrap_or_default().trim(),
            self.received_at.unwrap_or(now),
        )
        .with_roles(self.roles)
    }
}

async fn decide(
    State(state): State<AppState>,
    Json(body): Json<ChatEventIn>,
) -> Result<Json<Decision>, StatusCode> {
    let event = body.into_event(Utc::now());
    run(&state, event).await
}

/// Raw IRC line in, decision out. Non-PRIVMSG lines get 204.
async fn ingest(State(state): State<AppState>, line: String) -> Response {
    match irc::parse_privmsg(&line, Utc::now()) {
        Some(event) => run(&state, event).await.into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn run(state: &AppState, event: ChatEvent) -> Result<Json<Decision>, StatusCode> {
    match state.client.decide(event).await {
        Ok(d) => Ok(Json(d)),
        Err(e) => {
            warn!(target: "chatgate", error = ?e, "decision failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn get_config(State(state): State<AppState>) -> Json<FilterConfig> {
    Json(*state.config.current())
}

/// Write the live snapshot back to the settings file and return it.
/// A failed write is logged; the in-memory change stands.
fn persist(state: &AppState) -> Json<FilterConfig> {
    let cfg = *state.config.current();
    if let Some(path) = state.settings_path.as_deref() {
        if let Err(e) = config::persist_filter_config(path, &cfg) {
            warn!(target: "chatgate", error = ?e, path = %path.display(), "settings not saved");
        }
    }
    Json(cfg)
}

async fn put_config(
    State(state): State<AppState>,
    Json(cfg): Json<FilterConfig>,
) -> Json<FilterConfig> {
    state.config.replace(cfg);
    persist(&state)
}

#[derive(Debug, Deserialize)]
struct ThresholdIn {
    mps_threshold: f64,
}

async fn patch_threshold(
    State(state): State<AppState>,
    Json(body): Json<ThresholdIn>,
) -> Json<FilterConfig> {
    state.config.set_mps_threshold(body.mps_threshold);
    persist(&state)
}

async fn patch_bypass(
    State(state): State<AppState>,
    Json(body): Json<RoleBypass>,
) -> Json<FilterConfig> {
    state.config.set_role_bypass(body);
    persist(&state)
}

#[derive(Debug, Serialize)]
struct StatusOut {
    filter_active: bool,
    messages_per_second: f64,
    label: String,
}

/// Last rate state, formatted the way the status line shows it.
async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let rate = state.observer.last_rate().unwrap_or(RateState {
        messages_per_second: 0.0,
        filter_active: false,
    });
    let label = format!(
        "{} ({:.1} MPS)",
        if rate.filter_active {
            "FILTER ACTIVE"
        } else {
            "FILTER OFF"
        },
        rate.messages_per_second
    );
    Json(StatusOut {
        filter_active: rate.filter_active,
        messages_per_second: rate.messages_per_second,
        label,
    })
}
