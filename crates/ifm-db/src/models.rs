//! Database row types. These map directly to SQLite rows.
//! Distinct from ifm-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use ifm_types::models::{Channel, Hashtag};
use tracing::warn;

pub struct ChannelRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub detail: String,
    pub picture: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct HashtagRow {
    pub id: i64,
    pub label: String,
}

impl ChannelRow {
    pub fn into_model(self) -> Channel {
        let created_at = parse_timestamp(&self.created_at, self.id);
        let updated_at = parse_timestamp(&self.updated_at, self.id);
        Channel {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            detail: self.detail,
            picture: self.picture,
            created_at,
            updated_at,
        }
    }
}

impl HashtagRow {
    pub fn into_model(self) -> Hashtag {
        Hashtag {
            id: self.id,
            label: self.label,
        }
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
fn parse_timestamp(raw: &str, channel_id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on channel {}: {}", raw, channel_id, e);
            DateTime::default()
        })
}
