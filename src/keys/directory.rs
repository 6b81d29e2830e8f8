use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};

/// One current public key for one device.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeviceKey {
    pub device_id: String,
    pub key_id: String,
    pub public_key: String,
}

/// Per-account, per-device public-key registry. Rows are append-only; a
/// device's current key is whichever row was registered last.
#[derive(Clone)]
pub struct KeyDirectory {
    pool: SqlitePool,
}

impl KeyDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a key for `alias`. The account id is resolved inside the
    /// statement from the authenticated alias, never taken from the client.
    /// Re-announcing an existing (device, key) pair appends a new historical
    /// row rather than failing.
    pub async fn register_key(
        &self,
        alias: &str,
        device_id: &str,
        key_id: &str,
        public_key: &str,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            "INSERT INTO device_keys (account_id, device_id, key_id, public_key)
             SELECT id, ?, ?, ? FROM accounts WHERE alias = ?",
        )
        .bind(device_id)
        .bind(key_id)
        .bind(public_key)
        .bind(alias)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::UnknownAlias);
        }
        tracing::info!(alias, device_id, key_id, "registered device key");
        Ok(())
    }

    /// Most recent key per device for `alias`, empty for an alias with no
    /// devices. One ranked query: ties on created_at break on rowid, so a
    /// reader sees exactly one key per device even when two registrations
    /// land in the same second.
    pub async fn latest_keys(&self, alias: &str) -> ApiResult<Vec<DeviceKey>> {
        let keys = sqlx::query_as::<_, DeviceKey>(
            "SELECT device_id, key_id, public_key
             FROM (SELECT account_id, device_id, key_id, public_key,
                          RANK() OVER (
                              PARTITION BY account_id, device_id
                              ORDER BY created_at DESC, rowid DESC
                          ) recency
                   FROM device_keys) ranked
             JOIN accounts ON accounts.id = ranked.account_id
             WHERE ranked.recency = 1 AND accounts.alias = ?
             ORDER BY device_id",
        )
        .bind(alias)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(alias, count = keys.len(), "read latest device keys");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::CredentialStore;
    use crate::db::test_pool;

    async fn directory_with_account(alias: &str) -> KeyDirectory {
        let pool = test_pool().await;
        CredentialStore::new(pool.clone())
            .insert_account(alias, "salt", "hash")
            .await
            .unwrap();
        KeyDirectory::new(pool)
    }

    #[tokio::test]
    async fn latest_key_wins() {
        let directory = directory_with_account("zawie").await;
        directory
            .register_key("zawie", "d1", "k1", "pk1")
            .await
            .unwrap();
        directory
            .register_key("zawie", "d1", "k2", "pk2")
            .await
            .unwrap();

        let keys = directory.latest_keys("zawie").await.unwrap();
        assert_eq!(
            keys,
            vec![DeviceKey {
                device_id: "d1".into(),
                key_id: "k2".into(),
                public_key: "pk2".into(),
            }]
        );
    }

    #[tokio::test]
    async fn one_key_per_device() {
        let directory = directory_with_account("zawie").await;
        directory
            .register_key("zawie", "d1", "k1", "pk1")
            .await
            .unwrap();
        directory
            .register_key("zawie", "d2", "k2", "pk2")
            .await
            .unwrap();
        directory
            .register_key("zawie", "d2", "k3", "pk3")
            .await
            .unwrap();

        let keys = directory.latest_keys("zawie").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].key_id, "k1");
        assert_eq!(keys[1].key_id, "k3");
    }

    #[tokio::test]
    async fn timestamp_collision_breaks_on_insertion_order() {
        // created_at has second resolution, so back-to-back registrations
        // collide; rowid decides.
        let directory = directory_with_account("zawie").await;
        for key_id in ["k1", "k2", "k3"] {
            directory
                .register_key("zawie", "d1", key_id, "pk")
                .await
                .unwrap();
        }

        let keys = directory.latest_keys("zawie").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_id, "k3");
    }

    #[tokio::test]
    async fn no_devices_is_empty_not_an_error() {
        let directory = directory_with_account("zawie").await;
        assert!(directory.latest_keys("zawie").await.unwrap().is_empty());
        // An alias with no account behaves the same on read.
        assert!(directory.latest_keys("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn registering_for_unknown_alias_fails() {
        let directory = KeyDirectory::new(test_pool().await);
        let err = directory
            .register_key("ghost", "d1", "k1", "pk")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownAlias));
    }

    #[tokio::test]
    async fn reannouncement_appends_history() {
        let directory = directory_with_account("zawie").await;
        directory
            .register_key("zawie", "d1", "k1", "pk")
            .await
            .unwrap();
        directory
            .register_key("zawie", "d1", "k1", "pk")
            .await
            .unwrap();

        let keys = directory.latest_keys("zawie").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_id, "k1");
    }
}
