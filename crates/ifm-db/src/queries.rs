use crate::Database;
use crate::models::{ChannelRow, HashtagRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const CHANNEL_COLUMNS: &str =
    "c.id, c.user_id, c.title, c.detail, c.picture, c.created_at, c.updated_at";

/// Window within which a channel counts as recently updated for the popular list.
pub const POPULAR_WINDOW_HOURS: u32 = 36;

impl Database {
    // -- Channels --

    pub fn get_channel(&self, id: i64) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CHANNEL_COLUMNS} FROM channels c WHERE c.id = ?1");
            conn.query_row(&sql, [id], channel_from_row).optional()
        })
    }

    pub fn list_channels_by_user(&self, user_id: i64) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let sql =
                format!("SELECT {CHANNEL_COLUMNS} FROM channels c WHERE c.user_id = ?1 ORDER BY c.id");
            query_channels(conn, &sql, [user_id])
        })
    }

    /// Case-insensitive substring match on title or detail. `%` and `_` in the
    /// keyword are matched literally.
    pub fn search_channels(&self, keyword: &str) -> Result<Vec<ChannelRow>> {
        let pattern = format!("%{}%", escape_like(keyword));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels c
                 WHERE c.title LIKE ?1 ESCAPE '\\' OR c.detail LIKE ?1 ESCAPE '\\'
                 ORDER BY c.id"
            );
            query_channels(conn, &sql, [pattern])
        })
    }

    /// Channels updated within the popular window, most subscribed first.
    pub fn list_popular_channels(&self) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels c
                 LEFT JOIN subscriptions s ON s.channel_id = c.id
                 WHERE c.updated_at >= datetime('now', '-' || ?1 || ' hours')
                 GROUP BY c.id
                 ORDER BY COUNT(s.user_id) DESC, c.id"
            );
            query_channels(conn, &sql, [POPULAR_WINDOW_HOURS])
        })
    }

    pub fn list_subscribed_channels(&self, user_id: i64) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CHANNEL_COLUMNS} FROM subscriptions s
                 JOIN channels c ON c.id = s.channel_id
                 WHERE s.user_id = ?1
                 ORDER BY s.created_at, s.rowid"
            );
            query_channels(conn, &sql, [user_id])
        })
    }

    /// Insert a channel and its hashtag links in one transaction.
    /// Returns the id assigned by SQLite.
    pub fn create_channel(
        &self,
        user_id: i64,
        title: &str,
        detail: &str,
        hashtag_ids: &[i64],
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO channels (user_id, title, detail) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, title, detail],
            )?;
            let channel_id = tx.last_insert_rowid();
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO channel_hashtags (channel_id, hashtag_id) VALUES (?1, ?2)",
                )?;
                for hashtag_id in hashtag_ids {
                    stmt.execute([channel_id, *hashtag_id])?;
                }
            }
            tx.commit()?;
            Ok(channel_id)
        })
    }

    pub fn update_channel_title(&self, id: i64, title: &str) -> Result<bool> {
        self.update_channel_column(id, "title", Some(title))
    }

    pub fn update_channel_detail(&self, id: i64, detail: &str) -> Result<bool> {
        self.update_channel_column(id, "detail", Some(detail))
    }

    pub fn update_channel_picture(&self, id: i64, picture: Option<&str>) -> Result<bool> {
        self.update_channel_column(id, "picture", picture)
    }

    /// `column` is always one of the literals above, never caller input.
    fn update_channel_column(&self, id: i64, column: &str, value: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE channels SET {column} = ?2, updated_at = datetime('now') WHERE id = ?1"
            );
            let changed = conn.execute(&sql, rusqlite::params![id, value])?;
            Ok(changed > 0)
        })
    }

    /// Delete a channel and its hashtag links in one transaction.
    /// Returns false when no such channel existed.
    pub fn delete_channel(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM channel_hashtags WHERE channel_id = ?1", [id])?;
            let deleted = tx.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    // -- Hashtags --

    pub fn get_hashtag(&self, id: i64) -> Result<Option<HashtagRow>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id, label FROM hashtags WHERE id = ?1", [id], hashtag_from_row)
                .optional()
        })
    }

    pub fn list_hashtags(&self) -> Result<Vec<HashtagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, label FROM hashtags ORDER BY id")?;
            let rows = stmt
                .query_map([], hashtag_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_hashtags_by_channel(&self, channel_id: i64) -> Result<Vec<HashtagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.id, h.label FROM hashtags h
                 JOIN channel_hashtags ch ON ch.hashtag_id = h.id
                 WHERE ch.channel_id = ?1
                 ORDER BY h.id",
            )?;
            let rows = stmt
                .query_map([channel_id], hashtag_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch hashtags for a set of channels as `(channel_id, hashtag)` pairs.
    pub fn list_hashtags_for_channels(&self, channel_ids: &[i64]) -> Result<Vec<(i64, HashtagRow)>> {
        if channel_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=channel_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT ch.channel_id, h.id, h.label FROM channel_hashtags ch
                 JOIN hashtags h ON h.id = ch.hashtag_id
                 WHERE ch.channel_id IN ({})
                 ORDER BY ch.channel_id, h.id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(channel_ids), |row| {
                    Ok((
                        row.get(0)?,
                        HashtagRow {
                            id: row.get(1)?,
                            label: row.get(2)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Subscriptions --

    pub fn is_subscribed(&self, user_id: i64, channel_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = ?1 AND channel_id = ?2)",
                [user_id, channel_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Toggle a subscription: removes if present, inserts if not.
    /// Returns the new state, true meaning subscribed. The check and the
    /// write happen inside one transaction under the connection lock.
    pub fn toggle_subscription(&self, user_id: i64, channel_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM subscriptions WHERE user_id = ?1 AND channel_id = ?2",
                [user_id, channel_id],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO subscriptions (user_id, channel_id) VALUES (?1, ?2)",
                    [user_id, channel_id],
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
    }
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        detail: row.get(3)?,
        picture: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn hashtag_from_row(row: &Row<'_>) -> rusqlite::Result<HashtagRow> {
    Ok(HashtagRow {
        id: row.get(0)?,
        label: row.get(1)?,
    })
}

fn query_channels<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, channel_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn create_and_fetch_channel() {
        let db = db();
        let id = db.create_channel(1, "Daily News", "morning briefing", &[3, 7]).unwrap();

        let row = db.get_channel(id).unwrap().unwrap();
        assert_eq!(row.user_id, 1);
        assert_eq!(row.title, "Daily News");
        assert!(row.picture.is_none());

        let tags: Vec<i64> = db.list_hashtags_by_channel(id).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(tags, vec![3, 7]);
    }

    #[test]
    fn missing_channel_is_none() {
        assert!(db().get_channel(42).unwrap().is_none());
    }

    #[test]
    fn create_with_unknown_hashtag_rolls_back() {
        let db = db();
        assert!(db.create_channel(1, "t", "d", &[1, 999]).is_err());
        assert!(db.list_channels_by_user(1).unwrap().is_empty());
    }

    #[test]
    fn duplicate_hashtag_ids_are_collapsed() {
        let db = db();
        let id = db.create_channel(1, "t", "d", &[2, 2]).unwrap();
        assert_eq!(db.list_hashtags_by_channel(id).unwrap().len(), 1);
    }

    #[test]
    fn updates_touch_only_existing_rows() {
        let db = db();
        let id = db.create_channel(1, "old", "d", &[]).unwrap();

        assert!(db.update_channel_title(id, "new").unwrap());
        assert!(db.update_channel_detail(id, "more").unwrap());
        assert!(db.update_channel_picture(id, Some("/images/channel/a.png")).unwrap());
        assert!(!db.update_channel_title(id + 1, "nope").unwrap());

        let row = db.get_channel(id).unwrap().unwrap();
        assert_eq!(row.title, "new");
        assert_eq!(row.detail, "more");
        assert_eq!(row.picture.as_deref(), Some("/images/channel/a.png"));
    }

    #[test]
    fn delete_removes_links_and_subscriptions() {
        let db = db();
        let id = db.create_channel(1, "t", "d", &[1, 2]).unwrap();
        db.toggle_subscription(5, id).unwrap();

        assert!(db.delete_channel(id).unwrap());
        assert!(!db.delete_channel(id).unwrap());
        assert!(db.get_channel(id).unwrap().is_none());
        assert!(db.list_hashtags_by_channel(id).unwrap().is_empty());
        assert!(!db.is_subscribed(5, id).unwrap());
    }

    #[test]
    fn toggle_subscription_flips_state() {
        let db = db();
        let id = db.create_channel(1, "t", "d", &[]).unwrap();

        assert!(!db.is_subscribed(2, id).unwrap());
        assert!(db.toggle_subscription(2, id).unwrap());
        assert!(db.is_subscribed(2, id).unwrap());
        assert!(!db.toggle_subscription(2, id).unwrap());
        assert!(!db.is_subscribed(2, id).unwrap());
    }

    #[test]
    fn subscribing_to_missing_channel_fails() {
        assert!(db().toggle_subscription(2, 77).is_err());
    }

    #[test]
    fn search_matches_title_or_detail_case_insensitively() {
        let db = db();
        let a = db.create_channel(1, "Morning Jazz", "", &[]).unwrap();
        let b = db.create_channel(2, "Talk", "late night jazz talk", &[]).unwrap();
        db.create_channel(3, "Sports", "scores", &[]).unwrap();

        let ids: Vec<i64> = db.search_channels("JAZZ").unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let db = db();
        db.create_channel(1, "plain", "", &[]).unwrap();
        let pct = db.create_channel(1, "100% news", "", &[]).unwrap();

        let ids: Vec<i64> = db.search_channels("%").unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![pct]);
    }

    #[test]
    fn popular_orders_by_subscribers_within_window() {
        let db = db();
        let quiet = db.create_channel(1, "quiet", "", &[]).unwrap();
        let busy = db.create_channel(1, "busy", "", &[]).unwrap();
        let stale = db.create_channel(1, "stale", "", &[]).unwrap();

        db.toggle_subscription(10, busy).unwrap();
        db.toggle_subscription(11, busy).unwrap();
        db.toggle_subscription(10, stale).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE channels SET updated_at = datetime('now', '-37 hours') WHERE id = ?1",
                [stale],
            )?;
            Ok(())
        })
        .unwrap();

        let ids: Vec<i64> = db.list_popular_channels().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![busy, quiet]);
    }

    #[test]
    fn subscribed_channels_follow_subscription_order() {
        let db = db();
        let a = db.create_channel(1, "a", "", &[]).unwrap();
        let b = db.create_channel(1, "b", "", &[]).unwrap();
        db.toggle_subscription(9, b).unwrap();
        db.toggle_subscription(9, a).unwrap();

        let ids: Vec<i64> = db.list_subscribed_channels(9).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert!(db.list_subscribed_channels(10).unwrap().is_empty());

        // Re-subscribing moves the channel to the end.
        db.toggle_subscription(9, b).unwrap();
        db.toggle_subscription(9, b).unwrap();
        let ids: Vec<i64> = db.list_subscribed_channels(9).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn batch_hashtags_group_by_channel() {
        let db = db();
        let a = db.create_channel(1, "a", "", &[1, 4]).unwrap();
        let b = db.create_channel(1, "b", "", &[2]).unwrap();

        let pairs = db.list_hashtags_for_channels(&[a, b]).unwrap();
        let flat: Vec<(i64, i64)> = pairs.iter().map(|(c, h)| (*c, h.id)).collect();
        assert_eq!(flat, vec![(a, 1), (a, 4), (b, 2)]);
        assert!(db.list_hashtags_for_channels(&[]).unwrap().is_empty());
    }

    #[test]
    fn seeded_hashtags_are_listed() {
        let db = db();
        let tags = db.list_hashtags().unwrap();
        assert_eq!(tags.len(), 10);
        assert_eq!(db.get_hashtag(3).unwrap().unwrap().label, tags[2].label);
        assert!(db.get_hashtag(0).unwrap().is_none());
    }
}
