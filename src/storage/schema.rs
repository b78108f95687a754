use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TRIGGER IF NOT EXISTS kv_touch_updated AFTER UPDATE OF value ON kv
        BEGIN
            UPDATE kv SET updated_at = strftime('%s', 'now') WHERE key = new.key;
        END;
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
