use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// One ciphertext blob encrypted for one recipient device key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherEntry {
    #[serde(rename = "keyUUID")]
    pub key_id: String,
    pub cipher: String,
}

/// A fanned-out message as the relay hands it back: one object per logical
/// message, all its cipher entries reattached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender: String,
    pub recipient: String,
    pub created_at: String,
    pub ciphers: Vec<CipherEntry>,
}

/// Store-and-forward relay for opaque ciphertext bundles. The relay owns
/// messages jointly referenced by sender and recipient; nothing is ever
/// deleted.
#[derive(Clone)]
pub struct MessageRelay {
    pool: SqlitePool,
}

impl MessageRelay {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists one message and all its cipher entries atomically. A
    /// concurrent reader sees the whole bundle or nothing; a failure at any
    /// point leaves no partial write.
    pub async fn send(
        &self,
        sender: &str,
        recipient: &str,
        entries: &[CipherEntry],
    ) -> ApiResult<String> {
        if entries.is_empty() {
            return Err(ApiError::EmptyBundle);
        }

        let mut tx = self.pool.begin().await?;

        let sender_id = account_id(&mut tx, sender)
            .await?
            .ok_or(ApiError::UnknownParticipant)?;
        let recipient_id = account_id(&mut tx, recipient)
            .await?
            .ok_or(ApiError::UnknownParticipant)?;

        let message_id = Uuid::now_v7().to_string();
        sqlx::query("INSERT INTO messages (id, sender_id, recipient_id) VALUES (?, ?, ?)")
            .bind(&message_id)
            .bind(&sender_id)
            .bind(&recipient_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query("INSERT INTO cipher_entries (message_id, key_id, cipher) VALUES (?, ?, ?)")
                .bind(&message_id)
                .bind(&entry.key_id)
                .bind(&entry.cipher)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(
            sender,
            recipient,
            message = %message_id,
            ciphers = entries.len(),
            "stored message"
        );
        Ok(message_id)
    }

    /// All messages between `a` and `b` in either direction, newest first.
    /// Entry rows are regrouped under their parent message id, so a message
    /// encrypted for N devices comes back as one message with N entries.
    pub async fn conversation(&self, a: &str, b: &str) -> ApiResult<Vec<Message>> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT m.id, sender.alias, recipient.alias, m.created_at, ce.key_id, ce.cipher
             FROM messages m
             JOIN accounts sender ON sender.id = m.sender_id
             JOIN accounts recipient ON recipient.id = m.recipient_id
             JOIN cipher_entries ce ON ce.message_id = m.id
             WHERE (sender.alias = ? AND recipient.alias = ?)
                OR (sender.alias = ? AND recipient.alias = ?)
             ORDER BY m.created_at DESC, m.id DESC",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<Message> = Vec::new();
        let mut current_id: Option<String> = None;
        for (message_id, sender, recipient, created_at, key_id, cipher) in rows {
            let entry = CipherEntry { key_id, cipher };
            // Rows arrive sorted by message id within a timestamp, so entries
            // of one message are always adjacent.
            if current_id.as_deref() == Some(message_id.as_str()) {
                if let Some(last) = messages.last_mut() {
                    last.ciphers.push(entry);
                }
                continue;
            }
            current_id = Some(message_id);
            messages.push(Message {
                sender,
                recipient,
                created_at,
                ciphers: vec![entry],
            });
        }
        Ok(messages)
    }
}

async fn account_id(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    alias: &str,
) -> ApiResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM accounts WHERE alias = ?")
        .bind(alias)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|(id,)| id))
}
