//! Conversation and message storage using SQLite
//!
//! Holds users, API tokens, conversations and their messages. Deleting a
//! conversation removes its messages.

mod accounts;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::auth::AuthError;
use crate::conversation::{timestamp, Conversation, Message};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Duplicate id: {0}")]
    Duplicate(String),

    #[error("Corrupt timestamp in storage: {0}")]
    Timestamp(String),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Which conversations a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Owner(i64),
}

/// A message about to be written
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub conversation_id: String,
    pub user_id: Option<i64>,
    pub text: String,
    pub chat_display_text: String,
}

impl NewMessage {
    /// Empty assistant row to be filled in by the production pipeline
    pub fn placeholder(conversation_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            user_id: None,
            text: String::new(),
            chat_display_text: String::new(),
        }
    }

    fn stamped(self, timestamp: DateTime<Utc>) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            timestamp,
            text: self.text,
            chat_display_text: self.chat_display_text,
        }
    }
}

async fn insert_message<'e, E>(
    executor: E,
    message: &'e NewMessage,
    ts: DateTime<Utc>,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, user_id, timestamp, text, chat_display_text)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.id)
    .bind(&message.conversation_id)
    .bind(message.user_id)
    .bind(timestamp::encode(ts))
    .bind(&message.text)
    .bind(&message.chat_display_text)
    .execute(executor)
    .await?;

    Ok(())
}

type MessageRow = (String, String, Option<i64>, String, String, String);

fn message_from_row(row: MessageRow) -> Result<Message, StoreError> {
    let (id, conversation_id, user_id, ts, text, chat_display_text) = row;
    let timestamp = timestamp::decode(&ts).ok_or(StoreError::Timestamp(ts))?;
    Ok(Message {
        id,
        conversation_id,
        user_id,
        timestamp,
        text,
        chat_display_text,
    })
}

fn conversation_from_row(row: (String, i64, String, String)) -> Result<Conversation, StoreError> {
    let (id, user_id, name, created) = row;
    let created = timestamp::decode(&created).ok_or(StoreError::Timestamp(created))?;
    Ok(Conversation {
        id,
        user_id,
        name,
        created,
    })
}

/// Store for users, conversations and messages
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the SQLite database at the given path
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // A single connection that never recycles keeps the database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                is_staff INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                key TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                timestamp TEXT NOT NULL,
                text TEXT NOT NULL DEFAULT '',
                chat_display_text TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a conversation owned by `user_id`
    pub async fn create_conversation(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Conversation, StoreError> {
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            name: name.to_string(),
            created: timestamp::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&conversation.id)
        .bind(conversation.user_id)
        .bind(&conversation.name)
        .bind(timestamp::encode(conversation.created))
        .execute(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// List conversations visible in `scope`, oldest first
    pub async fn list_conversations(&self, scope: Scope) -> Result<Vec<Conversation>, StoreError> {
        let rows: Vec<(String, i64, String, String)> = match scope {
            Scope::All => {
                sqlx::query_as(
                    r#"
                    SELECT id, user_id, name, created_at
                    FROM conversations
                    ORDER BY created_at ASC, rowid ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
            Scope::Owner(user_id) => {
                sqlx::query_as(
                    r#"
                    SELECT id, user_id, name, created_at
                    FROM conversations
                    WHERE user_id = ?
                    ORDER BY created_at ASC, rowid ASC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(conversation_from_row).collect()
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let row: Option<(String, i64, String, String)> = sqlx::query_as(
            r#"
            SELECT id, user_id, name, created_at
            FROM conversations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(conversation_from_row).transpose()
    }

    /// Delete a conversation and all its messages
    pub async fn delete_conversation(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a message stamped with the current time
    pub async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let ts = timestamp::now();
        insert_message(&self.pool, &message, ts).await?;
        Ok(message.stamped(ts))
    }

    /// Insert a user message and the assistant placeholder answering it.
    ///
    /// Both rows are written or neither is.
    pub async fn create_exchange(
        &self,
        user_message: NewMessage,
        placeholder: NewMessage,
    ) -> Result<(Message, Message), StoreError> {
        let mut tx = self.pool.begin().await?;

        let asked = timestamp::now();
        insert_message(&mut *tx, &user_message, asked).await?;
        let answered = timestamp::now();
        insert_message(&mut *tx, &placeholder, answered).await?;

        tx.commit().await?;
        Ok((user_message.stamped(asked), placeholder.stamped(answered)))
    }

    /// Messages of a conversation in timestamp order.
    ///
    /// With `after`, only messages strictly newer than it are returned. Stored
    /// timestamps are whole microseconds, so truncating `after` keeps that exact.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = match after {
            Some(after) => {
                sqlx::query_as(
                    r#"
                    SELECT id, conversation_id, user_id, timestamp, text, chat_display_text
                    FROM messages
                    WHERE conversation_id = ? AND timestamp > ?
                    ORDER BY timestamp ASC, rowid ASC
                    "#,
                )
                .bind(conversation_id)
                .bind(timestamp::encode(after))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, conversation_id, user_id, timestamp, text, chat_display_text
                    FROM messages
                    WHERE conversation_id = ?
                    ORDER BY timestamp ASC, rowid ASC
                    "#,
                )
                .bind(conversation_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(message_from_row).collect()
    }

    pub async fn get_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let row: Option<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, user_id, timestamp, text, chat_display_text
            FROM messages
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(message_from_row).transpose()
    }

    /// Write both texts of a message. Returns false if the row is gone.
    pub async fn fill_message(
        &self,
        id: &str,
        text: &str,
        chat_display_text: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET text = ?, chat_display_text = ? WHERE id = ?
            "#,
        )
        .bind(text)
        .bind(chat_display_text)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
