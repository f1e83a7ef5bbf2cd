use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-created content feed. Field names on the wire follow the
/// client's existing camelCase contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "channelId")]
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "channelTitle")]
    pub title: String,
    #[serde(rename = "channelDetail")]
    pub detail: String,
    /// Public path of the cover picture, `/images/channel/<file>`.
    #[serde(rename = "channelPicture")]
    pub picture: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashtag {
    #[serde(rename = "hashtagId")]
    pub id: i64,
    #[serde(rename = "hashtagName")]
    pub label: String,
}

/// A channel together with its hashtags. Built per response, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelView {
    pub channel: Channel,
    #[serde(rename = "channelHashtag")]
    pub hashtags: Vec<Hashtag>,
}

impl ChannelView {
    pub fn new(channel: Channel, hashtags: Vec<Hashtag>) -> Self {
        Self { channel, hashtags }
    }

    pub fn hashtag_ids(&self) -> Vec<i64> {
        self.hashtags.iter().map(|h| h.id).collect()
    }
}
