use serde::{Deserialize, Serialize};

use crate::event::RoleTag;

/// Which privileged roles skip the dedup and substantiveness checks.
/// Cooldown applies to everyone regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBypass {
    pub broadcaster: bool,
    #[serde(alias = "mod")]
    pub moderator: bool,
    pub vip: bool,
    #[serde(alias = "sub")]
    pub subscriber: bool,
}

impl Default for RoleBypass {
    fn default() -> Self {
        Self::all(true)
    }
}

impl RoleBypass {
    pub fn all(on: bool) -> Self {
        Self {
            broadcaster: on,
            moderator: on,
            vip: on,
            subscriber: on,
        }
    }

    pub fn flag(&self, role: RoleTag) -> bool {
        match role {
            RoleTag::Broadcaster => self.broadcaster,
            RoleTag::Mod => self.moderator,
            RoleTag::Vip => self.vip,
            RoleTag::Sub => self.subscriber,
        }
    }

    pub fn set(&mut self, role: RoleTag, on: bool) {
        match role {
            RoleTag::Broadcaster => self.broadcaster = on,
            RoleTag::Mod => self.moderator = on,
            RoleTag::Vip => self.vip = on,
            RoleTag::Sub => self.subscriber = on,
        }
    }
}

/// True iff any role on the message has its bypass flag set.
pub fn bypass_for<'a, I>(roles: I, config: &RoleBypass) -> bool
where
    I: IntoIterator<Item = &'a RoleTag>,
{
    roles.into_iter().any(|r| config.flag(*r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn any_enabled_role_bypasses() {
        let mut cfg = RoleBypass::all(false);
        cfg.set(RoleTag::Vip, true);

        let roles: BTreeSet<RoleTag> = [RoleTag::Sub, RoleTag::Vip].into_iter().collect();
        assert!(bypass_for(&roles, &cfg));

        let roles: BTreeSet<RoleTag> = [RoleTag::Sub, RoleTag::Mod].into_iter().collect();
        assert!(!bypass_for(&roles, &cfg));
    }

    #[test]
    fn no_roles_never_bypass() {
        let roles: BTreeSet<RoleTag> = BTreeSet::new();
        assert!(!bypass_for(&roles, &RoleBypass::all(true)));
    }

    #[test]
    fn mapping_is_one_to_one() {
        for role in RoleTag::ALL {
            let mut cfg = RoleBypass::all(false);
            cfg.set(role, true);
            for other in RoleTag::ALL {
                assert_eq!(cfg.flag(other), other == role);
            }
        }
    }

    #[test]
    fn deserializes_short_aliases() {
        let cfg: RoleBypass =
            serde_json::from_str(r#"{"broadcaster":true,"mod":false,"vip":true,"sub":false}"#)
                .unwrap();
        assert!(cfg.broadcaster && cfg.vip);
        assert!(!cfg.moderator && !cfg.subscriber);
    }
}
