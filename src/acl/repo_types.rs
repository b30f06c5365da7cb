use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Table holding one row per principal.
pub const USERS_TABLE: &str = "users";

/// Row id for an email: lowercase, trimmed, non-alphanumeric runs collapsed
/// to `-`, no leading or trailing `-`.
pub fn normalize_id(email: &str) -> String {
    lazy_static! {
        static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    }
    let lower = email.trim().to_lowercase();
    NON_ALNUM
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Account status. Only `blocked` carries meaning; other values round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
    Other(String),
}

impl From<String> for UserStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => UserStatus::Active,
            "blocked" => UserStatus::Blocked,
            _ => UserStatus::Other(s),
        }
    }
}

impl From<UserStatus> for String {
    fn from(s: UserStatus) -> Self {
        s.to_string()
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => f.write_str("active"),
            UserStatus::Blocked => f.write_str("blocked"),
            UserStatus::Other(s) => f.write_str(s),
        }
    }
}

/// User row in the `users` table.
///
/// Rows are edited by hand from the dashboard. Only `admin`, `modules` and
/// `status` feed access decisions; the descriptive fields decode to `None`
/// when they have an unexpected shape, and a missing `email` decodes empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "truthy_flag")]
    pub admin: bool,
    #[serde(default, deserialize_with = "module_grants")]
    pub modules: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: UserStatus,
    #[serde(default, deserialize_with = "loose_text")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub hub_id: Option<String>,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "loose_timestamp",
        serialize_with = "time::serde::rfc3339::option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        rename = "createdBy",
        default,
        deserialize_with = "loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_by: Option<String>,
}

impl UserRecord {
    pub fn new(email: &str) -> Self {
        let email = email.trim().to_string();
        Self {
            id: normalize_id(&email),
            email,
            admin: false,
            modules: BTreeMap::new(),
            status: UserStatus::Active,
            full_name: None,
            hub_id: None,
            created_at: None,
            created_by: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == UserStatus::Blocked
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.get(module).copied().unwrap_or(false)
    }

    pub fn granted_modules(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(m, _)| m.as_str())
    }
}

/// Loose JavaScript-style truthiness, matching how rows are written by the
/// dashboard.
pub(crate) fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(d)?))
}

fn module_grants<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(m) => m.into_iter().map(|(k, v)| (k, is_truthy(&v))).collect(),
        Value::Array(l) => l
            .into_iter()
            .filter_map(|k| k.as_str().map(|k| (k.to_string(), true)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn status_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<UserStatus, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => UserStatus::from(s),
        _ => UserStatus::default(),
    })
}

/// Strings as-is, numbers and booleans in their JSON form, anything else `None`.
fn loose_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(loose_text(d)?.unwrap_or_default())
}

/// RFC 3339 strings, or numbers as epoch milliseconds. Unreadable values are
/// dropped.
fn loose_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<OffsetDateTime>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => OffsetDateTime::parse(&s, &Rfc3339).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok()),
        _ => None,
    })
}
