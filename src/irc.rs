// src/irc.rs
//! Adapter from tagged Twitch IRC lines to [`ChatEvent`]s.
//!
//! Socket handling and line splitting stay with the caller; this only turns
//! one already-split line into an event. Lines that don't parse cleanly
//! degrade to defaults instead of failing, so one bad line never stalls the
//! stream.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::event::{ChatEvent, RoleTag};

/// Minimal parsed form of one IRC line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrcLine {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl IrcLine {
    pub fn parse(line: &str) -> Self {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let mut out = IrcLine::default();

        if let Some(tag_block) = rest.strip_prefix('@') {
            let (tags, after) = tag_block.split_once(' ').unwrap_or((tag_block, ""));
            out.tags = parse_tags(tags);
            rest = after;
        }

        if let Some(pfx) = rest.strip_prefix(':') {
            let (prefix, after) = pfx.split_once(' ').unwrap_or((pfx, ""));
            out.prefix = Some(prefix.to_string());
            rest = after;
        }

        let (command, after) = rest.split_once(' ').unwrap_or((rest, ""));
        out.command = command.to_string();
        rest = after;

        if let Some(body) = rest.strip_prefix(':') {
            out.trailing = Some(body.to_string());
        } else if let Some((before, body)) = rest.split_once(" :") {
            out.params
                .extend(before.split_whitespace().map(str::to_string));
            out.trailing = Some(body.to_string());
        } else {
            out.params.extend(rest.split_whitespace().map(str::to_string));
        }

        out
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.tag(key) == Some("1")
    }

    /// Roles from the `broadcaster`, `mod`, `badges` (vip) and `subscriber` tags.
    pub fn roles(&self) -> Vec<RoleTag> {
        let mut roles = Vec::new();
        if self.flag("broadcaster") {
            roles.push(RoleTag::Broadcaster);
        }
        if self.flag("mod") {
            roles.push(RoleTag::Mod);
        }
        if self.tag("badges").unwrap_or_default().contains("vip") {
            roles.push(RoleTag::Vip);
        }
        if self.flag("subscriber") {
            roles.push(RoleTag::Sub);
        }
        roles
    }
}

/// `k=v;k2=v2` → map. Entries without `=` are skipped.
fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), unescape_tag_value(v)))
        .collect()
}

/// IRCv3 tag value escapes: `\:` `\s` `\\` `\r` `\n`.
fn unescape_tag_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    let mut chars = v.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

pub fn is_ping(line: &str) -> bool {
    line.starts_with("PING")
}

pub fn pong_reply() -> &'static str {
    "PONG :tmi.twitch.tv\r\n"
}

/// Turn a PRIVMSG line into an event. Anything else (PING, JOIN, notices) → `None`.
pub fn parse_privmsg(line: &str, received_at: DateTime<Utc>) -> Option<ChatEvent> {
    let parsed = IrcLine::parse(line);
    if parsed.command != "PRIVMSG" {
        return None;
    }
    let user = parsed.tag("display-name").unwrap_or_default();
    let text = parsed.trailing.as_deref().unwrap_or_default().trim();
    Some(ChatEvent::new(user, text, received_at).with_roles(parsed.roles()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DEFAULT_USER;

    const MOD_LINE: &str = "@badge-info=;badges=moderator/1,vip/1;color=#1E90FF;display-name=Some\\sMod;mod=1;subscriber=0;user-type=mod :somemod!somemod@somemod.tmi.twitch.tv PRIVMSG #chan :  that was clean  \r\n";

    #[test]
    fn parses_tags_prefix_and_trailing() {
        let l = IrcLine::parse(MOD_LINE);
        assert_eq!(l.command, "PRIVMSG");
        assert_eq!(l.params, vec!["#chan".to_string()]);
        assert_eq!(l.prefix.as_deref(), Some("somemod!somemod@somemod.tmi.twitch.tv"));
        assert_eq!(l.tag("color"), Some("#1E90FF"));
        assert_eq!(l.tag("badge-info"), Some(""));
    }

    #[test]
    fn privmsg_becomes_event_with_roles() {
        let now = Utc::now();
        let ev = parse_privmsg(MOD_LINE, now).expect("privmsg");
        assert_eq!(ev.user, "Some Mod");
        assert_eq!(ev.text, "that was clean");
        assert!(ev.has_role(RoleTag::Mod));
        assert!(ev.has_role(RoleTag::Vip));
        assert!(!ev.has_role(RoleTag::Sub));
        assert!(!ev.has_role(RoleTag::Broadcaster));
        assert_eq!(ev.received_at, now);
    }

    #[test]
    fn broadcaster_and_sub_flags() {
        let line = "@broadcaster=1;subscriber=1;display-name=Host :h!h@h PRIVMSG #h :hi all";
        let ev = parse_privmsg(line, Utc::now()).unwrap();
        assert!(ev.has_role(RoleTag::Broadcaster));
        assert!(ev.has_role(RoleTag::Sub));
    }

    #[test]
    fn missing_fields_fall_back() {
        let ev = parse_privmsg(":x!x@x PRIVMSG #chan", Utc::now()).unwrap();
        assert_eq!(ev.user, DEFAULT_USER);
        assert_eq!(ev.text, "");

        let ev = parse_privmsg("@display-name=;mod=0 :x PRIVMSG #c :yo", Utc::now()).unwrap();
        assert_eq!(ev.user, DEFAULT_USER);
        assert!(ev.roles.is_empty());
    }

    #[test]
    fn non_privmsg_lines_are_ignored() {
        assert!(parse_privmsg("PING :tmi.twitch.tv", Utc::now()).is_none());
        assert!(parse_privmsg(":tmi.twitch.tv 001 justinfan123 :Welcome", Utc::now()).is_none());
        assert!(parse_privmsg("", Utc::now()).is_none());
        assert!(is_ping("PING :tmi.twitch.tv"));
        assert!(pong_reply().ends_with("\r\n"));
    }

    #[test]
    fn tag_unescaping() {
        assert_eq!(unescape_tag_value(r"a\sb\:c\\d"), r"a b;c\d");
        assert_eq!(unescape_tag_value("trailing\\"), "trailing");
    }
}
