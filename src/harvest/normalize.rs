// src/harvest/normalize.rs
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::harvest::types::{ContactRecord, PresenceStatus, RawMember};

/// Raw presence tags as reported by the remote client.
const PRESENCE_TABLE: &[(&str, PresenceStatus)] = &[
    ("UserStatusOnline", PresenceStatus::Online),
    ("UserStatusRecently", PresenceStatus::Recently),
    ("UserStatusLastWeek", PresenceStatus::WithinAWeek),
    ("UserStatusLastMonth", PresenceStatus::WithinAMonth),
    ("UserStatusOffline", PresenceStatus::LongAgo),
    ("UserStatusEmpty", PresenceStatus::Unknown),
];

pub fn presence_from_raw(raw: Option<&str>) -> PresenceStatus {
    let Some(tag) = raw.map(str::trim) else {
        return PresenceStatus::Unknown;
    };
    PRESENCE_TABLE
        .iter()
        .find(|(k, _)| *k == tag)
        .map(|(_, v)| *v)
        .unwrap_or_default()
}

/// First non-empty of: "first last" (trimmed), username, "User {id}".
pub fn display_name(raw: &RawMember) -> String {
    let full = format!(
        "{} {}",
        raw.first_name.as_deref().unwrap_or_default(),
        raw.last_name.as_deref().unwrap_or_default()
    );
    let full = full.trim();
    if !full.is_empty() {
        return full.to_string();
    }
    match raw.username.as_deref().map(str::trim) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => format!("User {}", raw.id),
    }
}

pub fn normalize(raw: &RawMember, scraped_at: DateTime<Utc>) -> ContactRecord {
    ContactRecord {
        id: raw.id.to_string(),
        username: non_empty(raw.username.as_deref()),
        display_name: display_name(raw),
        phone: non_empty(raw.phone.as_deref()),
        is_bot: raw.bot,
        is_verified: raw.verified,
        is_premium: raw.premium,
        presence_status: presence_from_raw(raw.presence.as_deref()),
        scraped_at,
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Strip link prefix, leading '@' and trailing '/' from a caller-supplied identifier.
pub fn normalize_source_identifier(raw: &str) -> String {
    static RE_PREFIX: OnceCell<Regex> = OnceCell::new();
    let re = RE_PREFIX.get_or_init(|| {
        Regex::new(r"(?i)^(?:https?://)?(?:www\.)?(?:t\.me|telegram\.me)/").unwrap()
    });
    let s = raw.trim();
    let s = re.replace(s, "");
    let s = s.trim_end_matches('/');
    s.strip_prefix('@').unwrap_or(s).trim().to_string()
}
