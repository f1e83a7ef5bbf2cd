use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use tracing::{info, warn};

use ifm_db::Database;
use ifm_db::models::ChannelRow;
use ifm_storage::PictureStore;
use ifm_types::models::{ChannelView, Hashtag};

use crate::error::ChannelError;

pub type ChannelResult<T> = Result<T, ChannelError>;

/// An uploaded picture as received from the client.
#[derive(Debug, Clone, Default)]
pub struct PictureUpload {
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl PictureUpload {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Channel workflow: ownership checks, hashtag assembly, picture handling
/// and compensation when a multi-step write fails halfway.
pub struct ChannelService {
    db: Arc<Database>,
    pictures: Arc<PictureStore>,
}

impl ChannelService {
    pub fn new(db: Arc<Database>, pictures: Arc<PictureStore>) -> Self {
        Self { db, pictures }
    }

    pub fn pictures(&self) -> &PictureStore {
        &self.pictures
    }

    // -- Reads --

    pub async fn get_channel(&self, channel_id: i64) -> ChannelResult<ChannelView> {
        let (row, hashtags) = self
            .run_db(move |db| {
                let Some(row) = db.get_channel(channel_id)? else {
                    return Ok(None);
                };
                let hashtags = db.list_hashtags_by_channel(channel_id)?;
                Ok(Some((row, hashtags)))
            })
            .await?
            .ok_or(ChannelError::NotFound(channel_id))?;

        Ok(ChannelView::new(
            row.into_model(),
            hashtags.into_iter().map(|h| h.into_model()).collect(),
        ))
    }

    pub async fn list_channels_by_user(&self, user_id: i64) -> ChannelResult<Vec<ChannelView>> {
        self.views(move |db| db.list_channels_by_user(user_id)).await
    }

    pub async fn list_popular_channels(&self) -> ChannelResult<Vec<ChannelView>> {
        self.views(|db| db.list_popular_channels()).await
    }

    pub async fn list_subscribed_channels(&self, user_id: i64) -> ChannelResult<Vec<ChannelView>> {
        self.views(move |db| db.list_subscribed_channels(user_id)).await
    }

    pub async fn search_channels(&self, keyword: &str) -> ChannelResult<Vec<ChannelView>> {
        let keyword = keyword.trim().to_string();
        self.views(move |db| db.search_channels(&keyword)).await
    }

    pub async fn list_hashtags(&self) -> ChannelResult<Vec<Hashtag>> {
        let rows = self.run_db(|db| db.list_hashtags()).await?;
        Ok(rows.into_iter().map(|h| h.into_model()).collect())
    }

    // -- Writes --

    /// Create a channel with its hashtags and cover picture.
    ///
    /// The channel row and hashtag links are written in one transaction. The
    /// picture is saved afterwards because its name needs the channel id; if
    /// that fails the channel is deleted again and nothing is left behind.
    pub async fn create_channel(
        &self,
        user_id: i64,
        title: &str,
        detail: &str,
        picture: PictureUpload,
        hashtag_ids: &[i64],
    ) -> ChannelResult<i64> {
        if picture.is_empty() {
            return Err(ChannelError::EmptyUpload);
        }

        let ids = hashtag_ids.to_vec();
        let missing = self
            .run_db(move |db| {
                for id in ids {
                    if db.get_hashtag(id)?.is_none() {
                        return Ok(Some(id));
                    }
                }
                Ok(None)
            })
            .await?;
        if let Some(id) = missing {
            return Err(ChannelError::UnknownHashtag(id));
        }

        let (title, detail, ids) = (title.to_string(), detail.to_string(), hashtag_ids.to_vec());
        let channel_id = self
            .run_db(move |db| db.create_channel(user_id, &title, &detail, &ids))
            .await?;

        let filename = match self
            .pictures
            .save_picture(channel_id, &picture.data, picture.file_name.as_deref())
            .await
        {
            Ok(filename) => filename,
            Err(e) => {
                self.discard_channel(channel_id).await;
                return Err(e.into());
            }
        };

        let public = self.pictures.public_path(&filename);
        if let Err(e) = self.attach_picture(channel_id, &public).await {
            self.discard_channel(channel_id).await;
            return Err(e);
        }

        info!("User {} created channel {}", user_id, channel_id);
        Ok(channel_id)
    }

    /// Replace the cover picture. Returns the new public path.
    ///
    /// The new file is saved and referenced before the old one is removed,
    /// so a failure at any step leaves the channel pointing at a file that
    /// exists.
    pub async fn update_channel_picture(
        &self,
        user_id: i64,
        channel_id: i64,
        picture: PictureUpload,
    ) -> ChannelResult<String> {
        if picture.is_empty() {
            return Err(ChannelError::EmptyUpload);
        }

        let channel = self.owned_channel(user_id, channel_id).await?;

        let filename = self
            .pictures
            .save_picture(channel_id, &picture.data, picture.file_name.as_deref())
            .await?;
        let public = self.pictures.public_path(&filename);
        self.attach_picture(channel_id, &public).await?;

        if let Some(old) = channel.picture.filter(|old| !old.is_empty()) {
            self.discard_picture(&old).await;
        }

        Ok(public)
    }

    pub async fn update_channel_detail(
        &self,
        user_id: i64,
        channel_id: i64,
        detail: &str,
    ) -> ChannelResult<()> {
        self.owned_channel(user_id, channel_id).await?;
        let detail = detail.to_string();
        self.update_row(channel_id, move |db| db.update_channel_detail(channel_id, &detail))
            .await
    }

    pub async fn update_channel_title(
        &self,
        user_id: i64,
        channel_id: i64,
        title: &str,
    ) -> ChannelResult<()> {
        self.owned_channel(user_id, channel_id).await?;
        let title = title.to_string();
        self.update_row(channel_id, move |db| db.update_channel_title(channel_id, &title))
            .await
    }

    /// Delete a channel with its hashtag links, then its picture file.
    pub async fn delete_channel(&self, user_id: i64, channel_id: i64) -> ChannelResult<()> {
        let channel = self.owned_channel(user_id, channel_id).await?;
        self.run_db(move |db| db.delete_channel(channel_id)).await?;

        if let Some(picture) = channel.picture.filter(|p| !p.is_empty()) {
            self.discard_picture(&picture).await;
        }

        info!("User {} deleted channel {}", user_id, channel_id);
        Ok(())
    }

    // -- Subscriptions --

    pub async fn is_subscribed(&self, user_id: i64, channel_id: i64) -> ChannelResult<bool> {
        self.run_db(move |db| db.is_subscribed(user_id, channel_id)).await
    }

    /// Flip the subscription and return the new state (true = subscribed).
    pub async fn toggle_subscription(&self, user_id: i64, channel_id: i64) -> ChannelResult<bool> {
        let subscribed = self
            .run_db(move |db| {
                if db.get_channel(channel_id)?.is_none() {
                    return Ok(None);
                }
                db.toggle_subscription(user_id, channel_id).map(Some)
            })
            .await?
            .ok_or(ChannelError::NotFound(channel_id))?;
        Ok(subscribed)
    }

    // -- Helpers --

    /// Fetch a channel and check that `user_id` created it.
    async fn owned_channel(&self, user_id: i64, channel_id: i64) -> ChannelResult<ChannelRow> {
        let channel = self
            .run_db(move |db| db.get_channel(channel_id))
            .await?
            .ok_or(ChannelError::NotFound(channel_id))?;

        if channel.user_id != user_id {
            return Err(ChannelError::Forbidden { user_id, channel_id });
        }
        Ok(channel)
    }

    /// Run a single-row update. A row that vanished after the ownership
    /// check reports `NotFound` rather than success.
    async fn update_row<F>(&self, channel_id: i64, update: F) -> ChannelResult<()>
    where
        F: FnOnce(&Database) -> anyhow::Result<bool> + Send + 'static,
    {
        if self.run_db(update).await? {
            Ok(())
        } else {
            Err(ChannelError::NotFound(channel_id))
        }
    }

    /// Point the channel at a freshly saved picture; the file is removed
    /// again if the row cannot be updated.
    async fn attach_picture(&self, channel_id: i64, public_path: &str) -> ChannelResult<()> {
        let path = public_path.to_string();
        let attached = self
            .update_row(channel_id, move |db| {
                db.update_channel_picture(channel_id, Some(&path))
            })
            .await;
        if attached.is_err() {
            self.discard_picture(public_path).await;
        }
        attached
    }

    /// Load channel rows and attach their hashtags with one batch query.
    async fn views<F>(&self, load: F) -> ChannelResult<Vec<ChannelView>>
    where
        F: FnOnce(&Database) -> anyhow::Result<Vec<ChannelRow>> + Send + 'static,
    {
        let (rows, pairs) = self
            .run_db(move |db| {
                let rows = load(db)?;
                let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
                let pairs = db.list_hashtags_for_channels(&ids)?;
                Ok((rows, pairs))
            })
            .await?;

        let mut by_channel: HashMap<i64, Vec<Hashtag>> = HashMap::new();
        for (channel_id, hashtag) in pairs {
            by_channel.entry(channel_id).or_default().push(hashtag.into_model());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let hashtags = by_channel.remove(&row.id).unwrap_or_default();
                ChannelView::new(row.into_model(), hashtags)
            })
            .collect())
    }

    /// Run blocking DB work off the async runtime.
    async fn run_db<F, T>(&self, f: F) -> ChannelResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
            .map_err(ChannelError::Store)
    }

    /// Compensation: remove a channel created by a failed workflow.
    async fn discard_channel(&self, channel_id: i64) {
        match self.run_db(move |db| db.delete_channel(channel_id)).await {
            Ok(_) => warn!("Rolled back channel {} after failed creation", channel_id),
            Err(e) => warn!("Failed to roll back channel {}: {}", channel_id, e),
        }
    }

    /// Best-effort picture removal; the file store treats missing files as done.
    async fn discard_picture(&self, public_path: &str) {
        if let Err(e) = self.pictures.delete_picture(public_path).await {
            warn!("Failed to delete picture {}: {}", public_path, e);
        }
    }
}
