// src/event.rs
//! Chat event model handed to the filter by the protocol layer.
//!
//! One `ChatEvent` per parsed chat line. The filter only borrows events, so
//! they stay immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fallback identity when the upstream line carries no usable display name.
pub const DEFAULT_USER: &str = "user";

/// Privileged chat roles carried as badges on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    Broadcaster,
    Mod,
    Vip,
    Sub,
}

impl RoleTag {
    pub const ALL: [RoleTag; 4] = [
        RoleTag::Broadcaster,
        RoleTag::Mod,
        RoleTag::Vip,
        RoleTag::Sub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::Broadcaster => "broadcaster",
            RoleTag::Mod => "mod",
            RoleTag::Vip => "vip",
            RoleTag::Sub => "sub",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub user: String,
    pub text: String,
    #[serde(default)]
    pub roles: BTreeSet<RoleTag>,
    pub received_at: DateTime<Utc>,
}

impl ChatEvent {
    /// Build an event without roles. An empty user falls back to [`DEFAULT_USER`].
    pub fn new(user: impl Into<String>, text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        let mut user = user.into();
        if user.trim().is_empty() {
            user = DEFAULT_USER.to_string();
        }
        Self {
            user,
            text: text.into(),
            roles: BTreeSet::new(),
            received_at,
        }
    }

    pub fn with_role(mut self, role: RoleTag) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn with_roles<I: IntoIterator<Item = RoleTag>>(mut self, roles: I) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn has_role(&self, role: RoleTag) -> bool {
        self.roles.contains(&role)
    }

    /// Hue in `0..360` derived from the user name, stable across runs.
    pub fn name_hue(&self) -> u16 {
        stable_hue(&self.user)
    }
}

/// FNV-1a (32-bit) over the UTF-8 bytes of `name`, folded into a hue.
///
/// The std hasher is seeded per process, so it can't be used for colours that
/// must look the same on every run.
pub fn stable_hue(name: &str) -> u16 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET;
    for b in name.as_bytes() {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % 360) as u16
}

/// Seconds elapsed from `earlier` to `later` (negative if reversed).
pub(crate) fn secs_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn empty_user_falls_back_to_default() {
        let ev = ChatEvent::new("  ", "hi", Utc::now());
        assert_eq!(ev.user, DEFAULT_USER);
    }

    #[test]
    fn roles_are_a_set() {
        let ev = ChatEvent::new("a", "b", Utc::now())
            .with_role(RoleTag::Mod)
            .with_roles([RoleTag::Mod, RoleTag::Sub]);
        assert_eq!(ev.roles.len(), 2);
        assert!(ev.has_role(RoleTag::Sub));
        assert!(!ev.has_role(RoleTag::Vip));
    }

    #[test]
    fn stable_hue_is_fnv1a() {
        // FNV-1a("") is the offset basis itself.
        assert_eq!(stable_hue(""), (0x811c_9dc5u32 % 360) as u16);
        // FNV-1a("a") = 0xe40c292c
        assert_eq!(stable_hue("a"), (0xe40c_292cu32 % 360) as u16);
        assert_eq!(stable_hue("viewer42"), stable_hue("viewer42"));
        assert!(stable_hue("someone") < 360);
    }

    #[test]
    fn secs_between_handles_fractions() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let t1 = t0 + Duration::milliseconds(2_500);
        assert!((secs_between(t0, t1) - 2.5).abs() < 1e-9);
        assert!((secs_between(t1, t0) + 2.5).abs() < 1e-9);
    }
}
