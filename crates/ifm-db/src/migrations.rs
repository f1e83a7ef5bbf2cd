use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (channels, hashtags, subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE channels (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL,
                title       TEXT NOT NULL,
                detail      TEXT NOT NULL DEFAULT '',
                picture     TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_channels_user ON channels(user_id);

            CREATE TABLE hashtags (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                label   TEXT NOT NULL UNIQUE
            );

            CREATE TABLE channel_hashtags (
                channel_id  INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
                hashtag_id  INTEGER NOT NULL REFERENCES hashtags(id),
                PRIMARY KEY (channel_id, hashtag_id)
            );

            CREATE TABLE subscriptions (
                user_id     INTEGER NOT NULL,
                channel_id  INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, channel_id)
            );

            CREATE INDEX idx_subscriptions_channel ON subscriptions(channel_id);

            -- Default topics offered by the client's create form
            INSERT INTO hashtags (label) VALUES
                ('news'), ('music'), ('technology'), ('culture'), ('education'),
                ('comedy'), ('sports'), ('history'), ('health'), ('business');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
