// src/config.rs
//! Filter thresholds and the persisted settings file.
//!
//! `FilterConfig` is what the engine reads on every decision. It is shared as
//! an immutable snapshot behind [`ConfigHandle`]; operators swap the whole
//! snapshot, so a decision never sees half of an update.
//!
//! `Settings` mirrors the on-disk settings file (TOML or JSON) and converts
//! into a `FilterConfig`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::event::RoleTag;
use crate::filter::bypass::RoleBypass;

pub const DEFAULT_MPS_THRESHOLD: f64 = 3.0;
pub const DEFAULT_COOLDOWN_SECS: f64 = 3.0;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
pub const DEFAULT_FONT_SIZE: u32 = 14;

pub const ENV_SETTINGS_PATH: &str = "CHATGATE_SETTINGS_PATH";
pub const ENV_MPS_THRESHOLD: &str = "CHATGATE_MPS_THRESHOLD";
pub const ENV_HOT_RELOAD: &str = "CHATGATE_HOT_RELOAD";
pub const DEFAULT_SETTINGS_TOML: &str = "config/chatgate.toml";
pub const DEFAULT_SETTINGS_JSON: &str = "settings.json";

/// Thresholds consumed by the filter engine.
///
/// Values are not range-checked; e.g. a zero or negative `mps_threshold`
/// simply keeps the filter permanently active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mps_threshold: f64,
    pub role_bypass: RoleBypass,
    pub cooldown_secs: f64,
    pub similarity_threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mps_threshold: DEFAULT_MPS_THRESHOLD,
            role_bypass: RoleBypass::default(),
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl FilterConfig {
    /// Apply `CHATGATE_MPS_THRESHOLD` if it parses as a finite float.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(t) = parse_f64_env(std::env::var(ENV_MPS_THRESHOLD).ok()) {
            self.mps_threshold = t;
        }
        self
    }
}

fn parse_f64_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Shared, atomically swappable config snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<FilterConfig>>>,
}

impl ConfigHandle {
    pub fn new(cfg: FilterConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(cfg))),
        }
    }

    /// The snapshot in effect right now.
    pub fn current(&self) -> Arc<FilterConfig> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, cfg: FilterConfig) {
        self.update(|c| *c = cfg);
    }

    pub fn set_mps_threshold(&self, value: f64) {
        self.update(|c| c.mps_threshold = value);
    }

    pub fn set_role_bypass(&self, bypass: RoleBypass) {
        self.update(|c| c.role_bypass = bypass);
    }

    pub fn set_bypass_for(&self, role: RoleTag, on: bool) {
        self.update(|c| c.role_bypass.set(role, on));
    }

    /// Copy, modify and swap under the write lock.
    fn update<F: FnOnce(&mut FilterConfig)>(&self, f: F) {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = **guard;
        f(&mut next);
        *guard = Arc::new(next);
    }
}

/* ----------------------------
Settings file
---------------------------- */

/// Persisted operator settings. Keys match the historical `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub channel: String,
    pub font_size: u32,
    pub mps_threshold: f64,
    pub bypass_broadcaster: bool,
    pub bypass_mod: bool,
    pub bypass_vip: bool,
    pub bypass_sub: bool,
    pub cooldown_secs: f64,
    pub similarity_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            mps_threshold: DEFAULT_MPS_THRESHOLD,
            bypass_broadcaster: true,
            bypass_mod: true,
            bypass_vip: true,
            bypass_sub: true,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl Settings {
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            mps_threshold: self.mps_threshold,
            role_bypass: RoleBypass {
                broadcaster: self.bypass_broadcaster,
                moderator: self.bypass_mod,
                vip: self.bypass_vip,
                subscriber: self.bypass_sub,
            },
            cooldown_secs: self.cooldown_secs,
            similarity_threshold: self.similarity_threshold,
        }
    }

    /// Fold live filter values back in before saving.
    pub fn absorb(&mut self, cfg: &FilterConfig) {
        self.mps_threshold = cfg.mps_threshold;
        self.bypass_broadcaster = cfg.role_bypass.broadcaster;
        self.bypass_mod = cfg.role_bypass.moderator;
        self.bypass_vip = cfg.role_bypass.vip;
        self.bypass_sub = cfg.role_bypass.subscriber;
        self.cooldown_secs = cfg.cooldown_secs;
        self.similarity_threshold = cfg.similarity_threshold;
    }
}

/// Load settings from an explicit path. Supports TOML or JSON formats.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_settings(&content, ext.as_str())
        .with_context(|| format!("parsing settings at {}", path.display()))
}

/// Load settings using env var + fallbacks:
/// 1) $CHATGATE_SETTINGS_PATH
/// 2) config/chatgate.toml
/// 3) settings.json
///
/// No file at all yields defaults.
pub fn load_settings_default() -> Result<Settings> {
    if let Some(pb) = resolve_settings_path()? {
        return load_settings_from(&pb);
    }
    Ok(Settings::default())
}

/// Which settings file the defaults chain would read, if any.
pub fn resolve_settings_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_SETTINGS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_SETTINGS_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_SETTINGS_TOML, DEFAULT_SETTINGS_JSON] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

/// Write settings as pretty JSON (TOML when the path says so).
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let is_toml = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let body = if is_toml {
        toml::to_string_pretty(settings).context("serializing settings as TOML")?
    } else {
        serde_json::to_string_pretty(settings).context("serializing settings as JSON")?
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating settings dir {}", parent.display()))?;
    }
    fs::write(path, body).with_context(|| format!("writing settings to {}", path.display()))
}

/// Fold the live filter values into the settings file at `path`, keeping
/// fields the filter doesn't own (channel, font size). A missing file starts
/// from defaults.
pub fn persist_filter_config(path: &Path, cfg: &FilterConfig) -> Result<()> {
    let mut settings = if path.exists() {
        load_settings_from(path)?
    } else {
        Settings::default()
    };
    settings.absorb(cfg);
    save_settings(path, &settings)
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<Settings> {
    let looks_json = s.trim_start().starts_with('{');
    if hint_ext == "json" || (hint_ext != "toml" && looks_json) {
        return serde_json::from_str(s).map_err(|e| anyhow!("invalid JSON settings: {e}"));
    }
    match toml::from_str(s) {
        Ok(v) => Ok(v),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported settings format: {toml_err}")),
    }
}

/* ----------------------------
Hot reload
---------------------------- */

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_HOT_RELOAD).ok().as_deref() == Some("1")
}

/// Poll `path` every 2s and swap the filter snapshot when the file changes.
/// No-op unless `CHATGATE_HOT_RELOAD=1`.
pub fn start_hot_reload_thread(handle: ConfigHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match load_settings_from(&path) {
                        Ok(settings) => {
                            handle.replace(settings.filter_config());
                            info!(target: "chatgate", path = %path.display(), "settings reloaded");
                        }
                        Err(e) => {
                            warn!(target: "chatgate", error = ?e, "settings reload failed; keeping previous");
                        }
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}
