use sqlx::SqlitePool;

/// Canonical schema. Accounts carry a single `id` surrogate key; every other
/// table references it, never the alias. Device keys and cipher entries are
/// append-only.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id            TEXT PRIMARY KEY,
        alias         TEXT NOT NULL UNIQUE,
        salt          TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at    DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id         TEXT PRIMARY KEY,
        alias      TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS device_keys (
        account_id TEXT NOT NULL,
        device_id  TEXT NOT NULL,
        key_id     TEXT NOT NULL,
        public_key TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id           TEXT PRIMARY KEY,
        sender_id    TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        created_at   DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS cipher_entries (
        message_id TEXT NOT NULL,
        key_id     TEXT NOT NULL,
        cipher     TEXT NOT NULL
    )",
];

pub async fn migrate(pool: &SqlitePool) -> sqlx::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}
