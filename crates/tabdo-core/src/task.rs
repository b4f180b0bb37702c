use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One to-do item as persisted under its list key.
///
/// Field names on disk are `text`, `dueDate`, `color` and `addedDate`, the
/// same shape the browser page wrote to `localStorage`. Records written by
/// that page carry no `id`; they deserialize with a nil id which the store
/// replaces on first read. The page never checked what it stored, so a
/// `null`, number or boolean in a text field reads as text instead of
/// rejecting the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(
        default = "Uuid::nil",
        deserialize_with = "lenient_id",
        skip_serializing_if = "Uuid::is_nil"
    )]
    pub id: Uuid,

    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub due_date: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub color: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub added_date: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(text: String, due_date: String, color: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            due_date,
            color,
            added_date: format_added_date(now),
            extra: BTreeMap::new(),
        }
    }

    pub fn has_due_date(&self) -> bool {
        !self.due_date.trim().is_empty()
    }
}

/// `2024-01-05T09:30:00.000Z`, millisecond precision in UTC.
pub fn format_added_date(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// An id that is missing, null or not a UUID reads as nil, so the store
/// hands out a fresh one instead of dropping the record.
fn lenient_id<'de, D>(deserializer: D) -> Result<Uuid, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => Uuid::parse_str(&raw).unwrap_or(Uuid::nil()),
        _ => Uuid::nil(),
    })
}
